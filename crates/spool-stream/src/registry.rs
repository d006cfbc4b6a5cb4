//! Bookkeeping shared by concurrent stream sessions on the same torrent.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard};

use spool_torrent_core::{InfoHash, PieceEngine, PieceIndex, PiecePriority};
use tracing::debug;

use crate::queue::PieceQueue;

#[derive(Debug, Clone, Copy)]
struct Baseline {
    priority: PiecePriority,
    holders: usize,
}

#[derive(Default)]
struct TorrentStreams {
    sessions: Vec<Arc<PieceQueue>>,
    baselines: HashMap<PieceIndex, Baseline>,
}

/// What a departing session must undo.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Release {
    /// Pieces no session holds any more, with the priority they had before
    /// the first session raised them.
    pub restore: Vec<(PieceIndex, PiecePriority)>,
    /// Pieces inside another live session's window.
    pub in_use: BTreeSet<PieceIndex>,
}

/// Registry of live sessions and the baseline priority of every piece they
/// hold.
///
/// The first session to hold a piece records the priority the engine had for
/// it; later sessions only bump the holder count. When the last holder
/// releases a piece the recorded priority is handed back for restoration.
/// Lock order is registry, then session queue.
#[derive(Default)]
pub struct StreamRegistry {
    torrents: Mutex<HashMap<InfoHash, TorrentStreams>>,
}

impl StreamRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `queue` as a live session and take a hold on `pieces`.
    pub fn acquire(&self, queue: &Arc<PieceQueue>, pieces: Range<PieceIndex>, engine: &dyn PieceEngine) {
        let torrent = queue.torrent();
        let mut torrents = self.lock_torrents();
        let streams = torrents.entry(torrent).or_default();
        streams.sessions.push(Arc::clone(queue));
        for piece in pieces {
            streams
                .baselines
                .entry(piece)
                .and_modify(|baseline| baseline.holders += 1)
                .or_insert_with(|| Baseline {
                    priority: engine.piece_priority(torrent, piece).unwrap_or_default(),
                    holders: 1,
                });
        }
    }

    /// Remove `queue` and drop its hold on `pieces`.
    pub fn release(&self, queue: &Arc<PieceQueue>, pieces: Range<PieceIndex>) -> Release {
        let torrent = queue.torrent();
        let mut torrents = self.lock_torrents();
        let Some(streams) = torrents.get_mut(&torrent) else {
            return Release::default();
        };
        streams.sessions.retain(|session| !Arc::ptr_eq(session, queue));

        let mut release = Release::default();
        for piece in pieces.clone() {
            let Some(baseline) = streams.baselines.get_mut(&piece) else {
                continue;
            };
            baseline.holders = baseline.holders.saturating_sub(1);
            if baseline.holders == 0 {
                release.restore.push((piece, baseline.priority));
                streams.baselines.remove(&piece);
            }
        }
        for session in &streams.sessions {
            let window = session.window();
            let overlap = window.begin().max(pieces.start)..window.end().min(pieces.end);
            release.in_use.extend(overlap);
        }
        if streams.sessions.is_empty() {
            torrents.remove(&torrent);
        }
        debug!(
            torrent = %torrent,
            restored = release.restore.len(),
            in_use = release.in_use.len(),
            "stream session released"
        );
        release
    }

    /// Number of live sessions on `torrent`.
    #[must_use]
    pub fn sessions(&self, torrent: InfoHash) -> usize {
        self.lock_torrents()
            .get(&torrent)
            .map_or(0, |streams| streams.sessions.len())
    }

    /// Total number of live sessions.
    #[must_use]
    pub fn active(&self) -> usize {
        self.lock_torrents()
            .values()
            .map(|streams| streams.sessions.len())
            .sum()
    }

    fn lock_torrents(&self) -> MutexGuard<'_, HashMap<InfoHash, TorrentStreams>> {
        self.torrents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

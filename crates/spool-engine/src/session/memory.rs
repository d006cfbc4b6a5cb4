use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use bytes::Bytes;
use spool_events::Event;
use spool_torrent_core::{
    InfoHash, PieceDeadline, PieceEngine, PieceIndex, PiecePriority, TorrentError, TorrentLayout,
    TorrentResult,
};
use tracing::debug;

use super::EngineSession;

/// Torrent content held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryTorrent {
    /// Torrent identifier.
    pub info_hash: InfoHash,
    /// Torrent geometry.
    pub layout: Arc<TorrentLayout>,
    /// Concatenated file content.
    pub content: Bytes,
}

impl MemoryTorrent {
    /// Pair a layout with its content.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidLayout`] when the content length differs
    /// from the layout's total size.
    pub fn new(info_hash: InfoHash, layout: TorrentLayout, content: Bytes) -> TorrentResult<Self> {
        if content.len() as u64 != layout.total_size {
            return Err(TorrentError::InvalidLayout {
                reason: "content length does not match layout",
            });
        }
        Ok(Self {
            info_hash,
            layout: Arc::new(layout),
            content,
        })
    }

    fn piece_bytes(&self, piece: PieceIndex) -> Bytes {
        let start = u64::from(piece) * u64::from(self.layout.piece_length);
        let size = u64::from(self.layout.piece_size(piece));
        let (Ok(start), Ok(end)) = (usize::try_from(start), usize::try_from(start + size)) else {
            return Bytes::new();
        };
        self.content.slice(start..end)
    }
}

/// Which pieces a torrent starts out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Every piece is present (seeding).
    Complete,
    /// No piece is present; pieces arrive via `complete_piece` or auto-completion.
    Empty,
}

/// Order in which a poll returns its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryOrder {
    /// Events in the order they were produced.
    #[default]
    Fifo,
    /// Each batch reversed, so later pieces overtake earlier ones.
    Reversed,
}

struct TorrentSlot {
    torrent: MemoryTorrent,
    have: Vec<bool>,
    priorities: Vec<PiecePriority>,
    deadlines: HashMap<PieceIndex, PieceDeadline>,
    withheld: HashSet<PieceIndex>,
    truncated: HashSet<PieceIndex>,
    reads: HashMap<PieceIndex, usize>,
    paused: bool,
}

impl TorrentSlot {
    fn new(torrent: MemoryTorrent, availability: Availability) -> Self {
        let pieces = torrent.layout.num_pieces() as usize;
        Self {
            have: vec![availability == Availability::Complete; pieces],
            priorities: vec![PiecePriority::DEFAULT; pieces],
            deadlines: HashMap::new(),
            withheld: HashSet::new(),
            truncated: HashSet::new(),
            reads: HashMap::new(),
            paused: false,
            torrent,
        }
    }

    fn check_piece(&self, piece: PieceIndex) -> TorrentResult<usize> {
        let slot = piece as usize;
        if slot < self.have.len() {
            Ok(slot)
        } else {
            Err(TorrentError::PieceOutOfRange {
                torrent: self.torrent.info_hash,
                piece,
            })
        }
    }

    fn content_event(&self, piece: PieceIndex) -> Option<Event> {
        if self.withheld.contains(&piece) {
            return None;
        }
        let buffer = if self.truncated.contains(&piece) {
            Bytes::new()
        } else {
            self.torrent.piece_bytes(piece)
        };
        Some(Event::PieceRead {
            torrent: self.torrent.info_hash,
            piece,
            buffer,
            error: None,
        })
    }
}

fn next_wanted(
    have: &[bool],
    priorities: &[PiecePriority],
    deadlines: &HashMap<PieceIndex, PieceDeadline>,
) -> Option<PieceIndex> {
    let missing = || {
        (0..have.len())
            .filter(|slot| !have[*slot] && priorities[*slot] != PiecePriority::DONT_DOWNLOAD)
            .filter_map(|slot| PieceIndex::try_from(slot).ok())
    };
    missing()
        .filter_map(|piece| deadlines.get(&piece).map(|hint| (hint.deadline, piece)))
        .min()
        .map(|(_, piece)| piece)
        .or_else(|| missing().max_by_key(|piece| (priorities[*piece as usize], Reverse(*piece))))
}

#[derive(Default)]
struct MemoryState {
    torrents: HashMap<InfoHash, TorrentSlot>,
    pending: Vec<Event>,
    order: DeliveryOrder,
    pieces_per_poll: usize,
}

impl MemoryState {
    fn slot(&self, torrent: InfoHash) -> TorrentResult<&TorrentSlot> {
        self.torrents
            .get(&torrent)
            .ok_or(TorrentError::NotFound { torrent })
    }

    fn slot_mut(&mut self, torrent: InfoHash) -> TorrentResult<&mut TorrentSlot> {
        self.torrents
            .get_mut(&torrent)
            .ok_or(TorrentError::NotFound { torrent })
    }

    fn finish_piece(&mut self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        let slot = self.slot_mut(torrent)?;
        let index = slot.check_piece(piece)?;
        if slot.have[index] {
            return Ok(());
        }
        slot.have[index] = true;
        let alert_armed = slot
            .deadlines
            .get_mut(&piece)
            .is_some_and(|hint| std::mem::replace(&mut hint.alert_when_available, false));
        let alert = if alert_armed {
            slot.content_event(piece)
        } else {
            None
        };
        self.pending.push(Event::PieceFinished { torrent, piece });
        if let Some(event) = alert {
            self.pending.push(event);
        }
        Ok(())
    }
}

/// In-memory engine session.
///
/// Serves torrent content from memory, records every priority and deadline
/// hint, and queues the events a real engine would raise until the next
/// [`EngineSession::poll_events`]. Knobs on the session simulate slow or
/// unreliable engines: missing pieces, auto-completion per poll, reversed
/// delivery, withheld pieces and zero-byte reads.
#[derive(Default)]
pub struct MemorySession {
    state: Mutex<MemoryState>,
}

impl MemorySession {
    /// Construct an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a torrent and queue a torrent-added event.
    pub fn add_torrent(&self, torrent: MemoryTorrent, availability: Availability) {
        let info_hash = torrent.info_hash;
        let name = torrent.layout.name.clone();
        let mut state = self.lock_state();
        state
            .torrents
            .insert(info_hash, TorrentSlot::new(torrent, availability));
        state.pending.push(Event::TorrentAdded {
            torrent: info_hash,
            name,
        });
    }

    /// Drop a torrent and queue a torrent-removed event.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] for unknown torrents.
    pub fn remove_torrent(&self, torrent: InfoHash) -> TorrentResult<()> {
        let mut state = self.lock_state();
        state
            .torrents
            .remove(&torrent)
            .ok_or(TorrentError::NotFound { torrent })?;
        state.pending.push(Event::TorrentRemoved { torrent });
        Ok(())
    }

    /// Pause a torrent: no auto-completion until resumed.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] for unknown torrents.
    pub fn pause_torrent(&self, torrent: InfoHash) -> TorrentResult<()> {
        let mut state = self.lock_state();
        state.slot_mut(torrent)?.paused = true;
        state.pending.push(Event::TorrentPaused { torrent });
        Ok(())
    }

    /// Resume a paused torrent.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] for unknown torrents.
    pub fn resume_torrent(&self, torrent: InfoHash) -> TorrentResult<()> {
        let mut state = self.lock_state();
        state.slot_mut(torrent)?.paused = false;
        state.pending.push(Event::TorrentResumed { torrent });
        Ok(())
    }

    /// Mark a piece downloaded. Queues piece-finished and, when an alerting
    /// deadline is armed, the piece content.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown torrents or pieces.
    pub fn complete_piece(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        self.lock_state().finish_piece(torrent, piece)
    }

    /// Queue an arbitrary engine event, such as a storage error.
    pub fn inject(&self, event: Event) {
        self.lock_state().pending.push(event);
    }

    /// Complete up to `pieces` wanted pieces per torrent on every poll.
    /// Pieces with deadlines go first, then the highest priority.
    pub fn set_pieces_per_poll(&self, pieces: usize) {
        self.lock_state().pieces_per_poll = pieces;
    }

    /// Choose the order of each poll batch.
    pub fn set_delivery_order(&self, order: DeliveryOrder) {
        self.lock_state().order = order;
    }

    /// Never deliver content for `piece`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown torrents or pieces.
    pub fn withhold_piece(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        let mut state = self.lock_state();
        let slot = state.slot_mut(torrent)?;
        slot.check_piece(piece)?;
        slot.withheld.insert(piece);
        Ok(())
    }

    /// Deliver `piece` as a zero-byte buffer.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown torrents or pieces.
    pub fn truncate_piece(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        let mut state = self.lock_state();
        let slot = state.slot_mut(torrent)?;
        slot.check_piece(piece)?;
        slot.truncated.insert(piece);
        Ok(())
    }

    /// Deadline currently attached to `piece`.
    #[must_use]
    pub fn deadline(&self, torrent: InfoHash, piece: PieceIndex) -> Option<PieceDeadline> {
        let state = self.lock_state();
        state.slot(torrent).ok()?.deadlines.get(&piece).copied()
    }

    /// Number of pieces carrying a deadline.
    #[must_use]
    pub fn deadline_count(&self, torrent: InfoHash) -> usize {
        self.lock_state()
            .slot(torrent)
            .map_or(0, |slot| slot.deadlines.len())
    }

    /// How many times `piece` was read.
    #[must_use]
    pub fn read_count(&self, torrent: InfoHash, piece: PieceIndex) -> usize {
        self.lock_state()
            .slot(torrent)
            .ok()
            .and_then(|slot| slot.reads.get(&piece).copied())
            .unwrap_or(0)
    }

    /// Info-hashes of every registered torrent.
    #[must_use]
    pub fn torrents(&self) -> Vec<InfoHash> {
        let mut torrents: Vec<_> = self.lock_state().torrents.keys().copied().collect();
        torrents.sort_unstable();
        torrents
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PieceEngine for MemorySession {
    fn layout(&self, torrent: InfoHash) -> Option<Arc<TorrentLayout>> {
        let state = self.lock_state();
        state
            .slot(torrent)
            .ok()
            .map(|slot| Arc::clone(&slot.torrent.layout))
    }

    fn have_piece(&self, torrent: InfoHash, piece: PieceIndex) -> bool {
        let state = self.lock_state();
        state
            .slot(torrent)
            .is_ok_and(|slot| slot.have.get(piece as usize).copied().unwrap_or(false))
    }

    fn read_piece(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        let mut state = self.lock_state();
        let slot = state.slot_mut(torrent)?;
        let index = slot.check_piece(piece)?;
        *slot.reads.entry(piece).or_default() += 1;
        let event = if slot.have[index] {
            slot.content_event(piece)
        } else {
            Some(Event::PieceRead {
                torrent,
                piece,
                buffer: Bytes::new(),
                error: Some("piece not downloaded".to_string()),
            })
        };
        if let Some(event) = event {
            state.pending.push(event);
        }
        Ok(())
    }

    fn piece_priority(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<PiecePriority> {
        let state = self.lock_state();
        let slot = state.slot(torrent)?;
        Ok(slot.priorities[slot.check_piece(piece)?])
    }

    fn set_piece_priority(
        &self,
        torrent: InfoHash,
        piece: PieceIndex,
        priority: PiecePriority,
    ) -> TorrentResult<()> {
        let mut state = self.lock_state();
        let slot = state.slot_mut(torrent)?;
        let index = slot.check_piece(piece)?;
        slot.priorities[index] = priority;
        Ok(())
    }

    fn set_piece_deadline(&self, torrent: InfoHash, deadline: PieceDeadline) -> TorrentResult<()> {
        let mut state = self.lock_state();
        let slot = state.slot_mut(torrent)?;
        let index = slot.check_piece(deadline.piece)?;
        let mut armed = deadline;
        let mut delivery = None;
        if deadline.alert_when_available && slot.have[index] {
            delivery = slot.content_event(deadline.piece);
            armed.alert_when_available = false;
        }
        slot.deadlines.insert(deadline.piece, armed);
        if let Some(event) = delivery {
            state.pending.push(event);
        }
        Ok(())
    }

    fn reset_piece_deadline(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        let mut state = self.lock_state();
        let slot = state.slot_mut(torrent)?;
        slot.check_piece(piece)?;
        slot.deadlines.remove(&piece);
        Ok(())
    }
}

impl EngineSession for MemorySession {
    fn poll_events(&self) -> Result<Vec<Event>> {
        let mut state = self.lock_state();
        if state.pieces_per_poll > 0 {
            let budget = state.pieces_per_poll;
            let mut completions = Vec::new();
            for (info_hash, slot) in state.torrents.iter().filter(|(_, slot)| !slot.paused) {
                let mut have = slot.have.clone();
                for _ in 0..budget {
                    let Some(piece) = next_wanted(&have, &slot.priorities, &slot.deadlines) else {
                        break;
                    };
                    have[piece as usize] = true;
                    completions.push((*info_hash, piece));
                }
            }
            for (info_hash, piece) in completions {
                state.finish_piece(info_hash, piece)?;
            }
        }
        let mut batch = std::mem::take(&mut state.pending);
        if state.order == DeliveryOrder::Reversed {
            batch.reverse();
        }
        drop(state);
        if !batch.is_empty() {
            debug!(events = batch.len(), "memory session produced events");
        }
        Ok(batch)
    }
}

//! Piece fetch broker: one future per request, many requests per piece.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::ops::Bound::{Excluded, Unbounded};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use spool_events::{Event, EventKind, EventObserver, EventTag};
use spool_torrent_core::{
    InfoHash, PieceEngine, PieceIndex, PieceKey, PiecePriority, SessionTicker,
};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{CancelReason, FetchError};

/// Delivered piece content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceData {
    /// Piece that was delivered.
    pub key: PieceKey,
    /// Shared piece bytes.
    pub buffer: Bytes,
}

type Reply = oneshot::Sender<Result<PieceData, FetchError>>;
type RequestId = (PieceKey, u64);

struct PendingRequest {
    deadline: Instant,
    reply: Reply,
}

#[derive(Default)]
struct BrokerState {
    requests: BTreeMap<RequestId, PendingRequest>,
    next_seq: u64,
    have: HashMap<InfoHash, BTreeSet<PieceIndex>>,
    sweep_cursor: Option<RequestId>,
}

impl BrokerState {
    fn has_piece(&self, key: PieceKey) -> bool {
        self.have
            .get(&key.torrent)
            .is_some_and(|pieces| pieces.contains(&key.piece))
    }

    fn has_pending(&self, key: PieceKey) -> bool {
        self.requests
            .range((key, 0)..=(key, u64::MAX))
            .next()
            .is_some()
    }

    fn take_key(&mut self, key: PieceKey) -> Vec<(PieceKey, PendingRequest)> {
        self.take_range((key, 0), (key, u64::MAX))
    }

    fn take_torrent(&mut self, torrent: InfoHash) -> Vec<(PieceKey, PendingRequest)> {
        self.take_range(
            (PieceKey::new(torrent, 0), 0),
            (PieceKey::new(torrent, PieceIndex::MAX), u64::MAX),
        )
    }

    fn take_range(&mut self, low: RequestId, high: RequestId) -> Vec<(PieceKey, PendingRequest)> {
        let ids: Vec<RequestId> = self
            .requests
            .range(low..=high)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.requests.remove(&id).map(|request| (id.0, request)))
            .collect()
    }
}

/// Asynchronous "fetch this piece" on top of the engine's read and priority
/// primitives.
///
/// Requests for the same piece are queued together and resolved by the same
/// delivery. Expired requests are swept one per tick in key order, so sweep
/// cost stays logarithmic regardless of how many requests are pending. Engine
/// calls are issued after the broker lock is released.
pub struct PieceBroker {
    engine: Arc<dyn PieceEngine>,
    state: Mutex<BrokerState>,
}

impl PieceBroker {
    /// Event kinds the broker must be subscribed to.
    pub const TAGS: [EventTag; 5] = [
        EventKind::PieceRead.tag(),
        EventKind::PieceFinished.tag(),
        EventKind::TorrentRemoved.tag(),
        EventKind::TorrentPaused.tag(),
        EventKind::HashFailed.tag(),
    ];

    /// Construct a broker over `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn PieceEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(BrokerState::default()),
        }
    }

    /// Request `piece`, resolving when the engine delivers it or `timeout`
    /// has elapsed and a sweep tick notices.
    ///
    /// A piece known to be present is read right away; otherwise its priority
    /// is raised to the maximum and the read follows its completion.
    pub fn read_piece(&self, torrent: InfoHash, piece: PieceIndex, timeout: Duration) -> PieceFetch {
        let key = PieceKey::new(torrent, piece);
        let (reply, receiver) = oneshot::channel();
        let known = {
            let mut state = self.lock_state();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.requests.insert(
                (key, seq),
                PendingRequest {
                    deadline: Instant::now() + timeout,
                    reply,
                },
            );
            state.has_piece(key)
        };

        let issued = if known || self.engine.have_piece(torrent, piece) {
            self.engine.read_piece(torrent, piece)
        } else {
            self.engine
                .set_piece_priority(torrent, piece, PiecePriority::TOP)
        };
        if let Err(err) = issued {
            warn!(torrent = %torrent, piece, error = %err, "engine rejected piece request");
            let failure = FetchError::Rejected {
                key,
                message: err.to_string(),
            };
            let rejected = self.lock_state().take_key(key);
            Self::resolve(rejected, &Err(failure));
        }
        PieceFetch { key, receiver }
    }

    /// Number of unresolved requests.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock_state().requests.len()
    }

    /// Whether the broker has seen `piece` complete.
    #[must_use]
    pub fn knows_piece(&self, torrent: InfoHash, piece: PieceIndex) -> bool {
        self.lock_state().has_piece(PieceKey::new(torrent, piece))
    }

    fn resolve(requests: Vec<(PieceKey, PendingRequest)>, outcome: &Result<PieceData, FetchError>) {
        for (_, request) in requests {
            let _ = request.reply.send(outcome.clone());
        }
    }

    fn on_piece_read(&self, key: PieceKey, buffer: &Bytes, error: Option<&String>) {
        let waiting = self.lock_state().take_key(key);
        if waiting.is_empty() {
            return;
        }
        let outcome = if error.is_some() || buffer.is_empty() {
            Err(FetchError::ReadFailed {
                key,
                message: error.cloned(),
            })
        } else {
            Ok(PieceData {
                key,
                buffer: buffer.clone(),
            })
        };
        debug!(torrent = %key.torrent, piece = key.piece, requests = waiting.len(), "resolving piece requests");
        Self::resolve(waiting, &outcome);
    }

    fn on_piece_finished(&self, key: PieceKey) {
        let wanted = {
            let mut state = self.lock_state();
            state.have.entry(key.torrent).or_default().insert(key.piece);
            state.has_pending(key)
        };
        if !wanted {
            return;
        }
        if let Err(err) = self.engine.read_piece(key.torrent, key.piece) {
            warn!(torrent = %key.torrent, piece = key.piece, error = %err, "piece read after completion failed");
        }
    }

    fn purge_torrent(&self, torrent: InfoHash, reason: CancelReason) {
        let purged = {
            let mut state = self.lock_state();
            if reason == CancelReason::TorrentRemoved {
                state.have.remove(&torrent);
            }
            state.take_torrent(torrent)
        };
        if purged.is_empty() {
            return;
        }
        debug!(torrent = %torrent, requests = purged.len(), ?reason, "purging piece requests");
        for (key, request) in purged {
            let _ = request.reply.send(Err(FetchError::Cancelled { key, reason }));
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EventObserver for PieceBroker {
    fn handle_event(&self, event: &Event) {
        match event {
            Event::PieceRead {
                torrent,
                piece,
                buffer,
                error,
            } => self.on_piece_read(PieceKey::new(*torrent, *piece), buffer, error.as_ref()),
            Event::PieceFinished { torrent, piece } => {
                self.on_piece_finished(PieceKey::new(*torrent, *piece));
            }
            Event::TorrentRemoved { torrent } => {
                self.purge_torrent(*torrent, CancelReason::TorrentRemoved);
            }
            Event::TorrentPaused { torrent } => {
                self.purge_torrent(*torrent, CancelReason::TorrentPaused);
            }
            Event::HashFailed { torrent, piece } => {
                if let Some(pieces) = self.lock_state().have.get_mut(torrent) {
                    pieces.remove(piece);
                }
            }
            _ => {}
        }
    }
}

impl SessionTicker for PieceBroker {
    fn on_tick(&self, now: Instant) {
        let expired = {
            let mut state = self.lock_state();
            let next = state
                .sweep_cursor
                .and_then(|cursor| {
                    state
                        .requests
                        .range((Excluded(cursor), Unbounded))
                        .next()
                        .map(|(id, _)| *id)
                })
                .or_else(|| state.requests.keys().next().copied());
            state.sweep_cursor = next;
            let Some(id) = next else {
                return;
            };
            let stale = state
                .requests
                .get(&id)
                .is_some_and(|request| request.deadline <= now || request.reply.is_closed());
            if stale {
                state.requests.remove(&id).map(|request| (id.0, request))
            } else {
                None
            }
        };

        if let Some((key, request)) = expired {
            debug!(torrent = %key.torrent, piece = key.piece, "piece request expired");
            let _ = request.reply.send(Err(FetchError::TimedOut { key }));
        }
    }
}

/// Future resolving to the outcome of one [`PieceBroker::read_piece`] call.
#[derive(Debug)]
pub struct PieceFetch {
    key: PieceKey,
    receiver: oneshot::Receiver<Result<PieceData, FetchError>>,
}

impl PieceFetch {
    /// Piece this fetch is waiting on.
    #[must_use]
    pub const fn key(&self) -> PieceKey {
        self.key
    }
}

impl Future for PieceFetch {
    type Output = Result<PieceData, FetchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let key = self.key;
        Pin::new(&mut self.receiver).poll(cx).map(|outcome| {
            outcome.unwrap_or(Err(FetchError::Cancelled {
                key,
                reason: CancelReason::BrokerClosed,
            }))
        })
    }
}

//! Per-session holding buffer fed by piece-read events.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use spool_events::{Event, EventKind, EventObserver, EventTag};
use spool_torrent_core::{InfoHash, PieceIndex};
use tokio::sync::Notify;

use crate::error::CancelReason;
use crate::window::StreamWindow;

#[derive(Debug)]
struct HeldPiece {
    piece: PieceIndex,
    buffer: Bytes,
}

impl PartialEq for HeldPiece {
    fn eq(&self, other: &Self) -> bool {
        self.piece == other.piece
    }
}

impl Eq for HeldPiece {}

impl PartialOrd for HeldPiece {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeldPiece {
    fn cmp(&self, other: &Self) -> Ordering {
        self.piece.cmp(&other.piece)
    }
}

#[derive(Debug)]
struct QueueState {
    window: StreamWindow,
    held: BinaryHeap<Reverse<HeldPiece>>,
    closed: Option<CancelReason>,
}

impl QueueState {
    fn discard_stale(&mut self, below: PieceIndex) {
        while self
            .held
            .peek()
            .is_some_and(|Reverse(top)| top.piece < below)
        {
            self.held.pop();
        }
    }
}

/// Holding buffer of one stream session.
///
/// Registered on the bus as an observer: piece-read events for its torrent
/// inside the window are pushed onto a min-heap and the consumer is woken.
/// Pieces outside the window are dropped, so the heap never holds anything
/// below `begin`. A removal event closes the queue.
#[derive(Debug)]
pub struct PieceQueue {
    torrent: InfoHash,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl PieceQueue {
    /// Event kinds a queue must be subscribed to.
    pub const TAGS: [EventTag; 2] = [EventKind::PieceRead.tag(), EventKind::TorrentRemoved.tag()];

    /// Empty queue for `torrent` over `window`.
    #[must_use]
    pub fn new(torrent: InfoHash, window: StreamWindow) -> Self {
        Self {
            torrent,
            state: Mutex::new(QueueState {
                window,
                held: BinaryHeap::new(),
                closed: None,
            }),
            notify: Notify::new(),
        }
    }

    /// Torrent this queue serves.
    #[must_use]
    pub const fn torrent(&self) -> InfoHash {
        self.torrent
    }

    /// Current window.
    #[must_use]
    pub fn window(&self) -> StreamWindow {
        self.lock_state().window
    }

    /// Number of pieces held.
    #[must_use]
    pub fn held(&self) -> usize {
        self.lock_state().held.len()
    }

    /// Offer a delivered piece. Returns whether it was accepted.
    pub fn offer(&self, piece: PieceIndex, buffer: Bytes) -> bool {
        {
            let mut state = self.lock_state();
            if state.closed.is_some() || !state.window.contains(piece) {
                return false;
            }
            state.held.push(Reverse(HeldPiece { piece, buffer }));
        }
        self.notify.notify_one();
        true
    }

    /// Pop `piece` if it is the smallest held piece, discarding anything below it.
    pub fn take(&self, piece: PieceIndex) -> Option<Bytes> {
        let mut state = self.lock_state();
        state.discard_stale(piece);
        if state
            .held
            .peek()
            .is_some_and(|Reverse(top)| top.piece == piece)
        {
            state.held.pop().map(|Reverse(held)| held.buffer)
        } else {
            None
        }
    }

    /// Slide the window past the consumed piece and purge stale duplicates.
    /// Returns the newly admitted piece, if any.
    pub fn advance(&self) -> Option<PieceIndex> {
        let mut state = self.lock_state();
        let admitted = state.window.advance();
        let begin = state.window.begin();
        state.discard_stale(begin);
        admitted
    }

    /// Why the queue was closed, if it was.
    #[must_use]
    pub fn closed(&self) -> Option<CancelReason> {
        self.lock_state().closed
    }

    /// Close the queue and wake the consumer.
    pub fn close(&self, reason: CancelReason) {
        {
            let mut state = self.lock_state();
            state.closed.get_or_insert(reason);
            state.held.clear();
        }
        self.notify.notify_one();
    }

    /// Wait for the next offer or close. A wake-up that arrived while nobody
    /// was waiting is kept, so callers re-check their predicate after every
    /// return.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EventObserver for PieceQueue {
    fn handle_event(&self, event: &Event) {
        match event {
            Event::PieceRead {
                torrent,
                piece,
                buffer,
                ..
            } if *torrent == self.torrent => {
                self.offer(*piece, buffer.clone());
            }
            Event::TorrentRemoved { torrent } if *torrent == self.torrent => {
                self.close(CancelReason::TorrentRemoved);
            }
            _ => {}
        }
    }
}

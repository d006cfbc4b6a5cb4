//! Registry of in-flight downloads for diagnostics.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use spool_torrent_core::{InfoHash, PieceIndex};
use uuid::Uuid;

/// What an in-flight download is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Planned, nothing sent yet.
    Received,
    /// Writing piece data to the client.
    WritingToSocket,
    /// Waiting for the engine to deliver the next piece.
    WaitingForEngine,
}

/// Snapshot of one in-flight download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestProgress {
    /// Tracker-assigned identifier.
    pub id: Uuid,
    /// Torrent being served.
    pub torrent: InfoHash,
    /// File path within the torrent.
    pub file_path: String,
    /// First requested byte within the file.
    pub start_offset: u64,
    /// Number of requested bytes.
    pub request_size: u64,
    /// Size of the whole file.
    pub file_size: u64,
    /// Bytes written so far.
    pub bytes_sent: u64,
    /// Piece currently being waited on or written.
    pub current_piece: PieceIndex,
    /// Current state.
    pub state: RequestState,
    /// When the download started.
    pub started_at: DateTime<Utc>,
}

impl RequestProgress {
    /// Share of the request already sent, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f64 {
        if self.request_size == 0 {
            return 100.0;
        }
        self.bytes_sent as f64 * 100.0 / self.request_size as f64
    }
}

type Entries = Arc<Mutex<BTreeMap<Uuid, RequestProgress>>>;

/// Shared table of in-flight downloads.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    entries: Entries,
}

impl RequestTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a download; it stays listed until the handle is dropped.
    #[must_use]
    pub fn register(
        &self,
        torrent: InfoHash,
        file_path: &str,
        start_offset: u64,
        request_size: u64,
        file_size: u64,
        first_piece: PieceIndex,
    ) -> RequestHandle {
        let id = Uuid::new_v4();
        lock_entries(&self.entries).insert(
            id,
            RequestProgress {
                id,
                torrent,
                file_path: file_path.to_owned(),
                start_offset,
                request_size,
                file_size,
                bytes_sent: 0,
                current_piece: first_piece,
                state: RequestState::Received,
                started_at: Utc::now(),
            },
        );
        RequestHandle {
            id,
            entries: Arc::clone(&self.entries),
        }
    }

    /// Every live download, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RequestProgress> {
        let mut entries: Vec<_> = lock_entries(&self.entries).values().cloned().collect();
        entries.sort_by_key(|entry| entry.started_at);
        entries
    }

    /// Number of live downloads.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_entries(&self.entries).len()
    }

    /// Whether nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration of one download; removes the entry when dropped.
#[derive(Debug)]
pub struct RequestHandle {
    id: Uuid,
    entries: Entries,
}

impl RequestHandle {
    /// Identifier of the tracked download.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Record the current state and piece.
    pub fn set_state(&self, state: RequestState, piece: PieceIndex) {
        if let Some(entry) = lock_entries(&self.entries).get_mut(&self.id) {
            entry.state = state;
            entry.current_piece = piece;
        }
    }

    /// Account for bytes written to the client.
    pub fn add_bytes(&self, bytes: u64) {
        if let Some(entry) = lock_entries(&self.entries).get_mut(&self.id) {
            entry.bytes_sent += bytes;
        }
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        lock_entries(&self.entries).remove(&self.id);
    }
}

fn lock_entries(entries: &Entries) -> MutexGuard<'_, BTreeMap<Uuid, RequestProgress>> {
    entries
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

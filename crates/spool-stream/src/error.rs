//! Error types for fetching, planning and streaming.

use spool_torrent_core::{InfoHash, PieceIndex, PieceKey};
use thiserror::Error;

/// Why a pending piece request was dropped without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The torrent was removed from the engine.
    TorrentRemoved,
    /// The torrent was paused.
    TorrentPaused,
    /// The broker went away before answering.
    BrokerClosed,
}

/// Failure of a single broker fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// No delivery before the request deadline.
    #[error("piece request timed out")]
    TimedOut {
        /// Requested piece.
        key: PieceKey,
    },
    /// The engine delivered an error or an empty buffer.
    #[error("piece read failed")]
    ReadFailed {
        /// Requested piece.
        key: PieceKey,
        /// Engine-provided description.
        message: Option<String>,
    },
    /// The engine refused the read or priority request.
    #[error("piece request rejected by engine")]
    Rejected {
        /// Requested piece.
        key: PieceKey,
        /// Engine-provided description.
        message: String,
    },
    /// The request was purged.
    #[error("piece request cancelled")]
    Cancelled {
        /// Requested piece.
        key: PieceKey,
        /// Purge cause.
        reason: CancelReason,
    },
}

/// Reasons a range cannot be planned; each maps to one HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The engine does not know the torrent.
    #[error("torrent not found")]
    UnknownTorrent {
        /// Requested torrent.
        torrent: InfoHash,
    },
    /// The file index is outside the torrent's file list.
    #[error("file index out of range")]
    FileIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of files in the torrent.
        files: usize,
    },
    /// The requested byte range cannot be satisfied.
    #[error("requested range not satisfiable")]
    Unsatisfiable {
        /// Size of the requested file.
        file_size: u64,
    },
}

/// Reasons a running stream session ended early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// A piece never arrived within the stall limit.
    #[error("piece delivery stalled")]
    PieceStalled {
        /// Piece being waited on.
        piece: PieceIndex,
    },
    /// The engine delivered a zero-byte or short piece.
    #[error("piece read interrupted")]
    ReadInterrupted {
        /// Piece that failed.
        piece: PieceIndex,
    },
    /// The torrent left the engine mid-stream.
    #[error("torrent no longer available")]
    TorrentGone {
        /// Cause reported by the engine.
        reason: CancelReason,
    },
    /// The client disconnected.
    #[error("client disconnected")]
    ClientGone,
    /// The client stopped reading for longer than the write stall limit.
    #[error("client write stalled")]
    WriteStalled,
}

impl StreamError {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::PieceStalled { .. } => "piece_stalled",
            Self::ReadInterrupted { .. } => "read_interrupted",
            Self::TorrentGone { .. } => "torrent_gone",
            Self::ClientGone => "client_gone",
            Self::WriteStalled => "write_stalled",
        }
    }
}

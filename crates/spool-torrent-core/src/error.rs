//! Error types for piece-level engine operations.

use std::error::Error;

use spool_events::{InfoHash, PieceIndex};
use thiserror::Error;

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Operation is not supported by the underlying engine.
    #[error("torrent operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Operation failed in the underlying engine.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent identifier when available.
        torrent: Option<InfoHash>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Torrent was not found.
    #[error("torrent not found")]
    NotFound {
        /// Missing torrent identifier.
        torrent: InfoHash,
    },
    /// Piece index is past the end of the torrent.
    #[error("piece index out of range")]
    PieceOutOfRange {
        /// Torrent identifier.
        torrent: InfoHash,
        /// Rejected piece index.
        piece: PieceIndex,
    },
    /// Priority value outside 0..=7.
    #[error("invalid piece priority")]
    InvalidPriority {
        /// Rejected raw value.
        value: u8,
    },
    /// Torrent geometry is unusable.
    #[error("invalid torrent layout")]
    InvalidLayout {
        /// Constraint that failed.
        reason: &'static str,
    },
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;

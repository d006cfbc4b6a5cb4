//! Engine control traits implemented by torrent adapters.

use std::sync::Arc;

use tokio::time::Instant;

use spool_events::{InfoHash, PieceIndex};

use crate::error::{TorrentError, TorrentResult};
use crate::model::{PieceDeadline, PiecePriority, TorrentLayout};

/// Piece-level control surface of a torrent engine.
///
/// Every method only posts a request; results such as piece content come back
/// asynchronously as events on the bus. Methods never block on network or disk
/// and may be called from event observers.
pub trait PieceEngine: Send + Sync {
    /// Geometry of `torrent`, if the engine knows it.
    fn layout(&self, torrent: InfoHash) -> Option<Arc<TorrentLayout>>;

    /// Whether `piece` is downloaded and verified.
    fn have_piece(&self, torrent: InfoHash, piece: PieceIndex) -> bool;

    /// Request the content of `piece`; delivered as a piece-read event.
    ///
    /// # Errors
    ///
    /// Returns an error if the torrent is unknown or the engine rejects the request.
    fn read_piece(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()>;

    /// Current priority of `piece`.
    ///
    /// # Errors
    ///
    /// Returns an error if the torrent or piece is unknown.
    fn piece_priority(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<PiecePriority>;

    /// Change the priority of `piece`.
    ///
    /// # Errors
    ///
    /// Returns an error if the torrent or piece is unknown.
    fn set_piece_priority(
        &self,
        torrent: InfoHash,
        piece: PieceIndex,
        priority: PiecePriority,
    ) -> TorrentResult<()>;

    /// Change several priorities at once.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by [`PieceEngine::set_piece_priority`].
    fn prioritize_pieces(
        &self,
        torrent: InfoHash,
        priorities: &[(PieceIndex, PiecePriority)],
    ) -> TorrentResult<()> {
        for (piece, priority) in priorities {
            self.set_piece_priority(torrent, *piece, *priority)?;
        }
        Ok(())
    }

    /// Attach a deadline hint to a piece.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine lacks deadline support or the piece is unknown.
    fn set_piece_deadline(&self, torrent: InfoHash, deadline: PieceDeadline) -> TorrentResult<()> {
        let _ = (torrent, deadline);
        Err(TorrentError::Unsupported {
            operation: "set_piece_deadline",
        })
    }

    /// Clear a previously set deadline hint.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine lacks deadline support or the piece is unknown.
    fn reset_piece_deadline(&self, torrent: InfoHash, piece: PieceIndex) -> TorrentResult<()> {
        let _ = (torrent, piece);
        Err(TorrentError::Unsupported {
            operation: "reset_piece_deadline",
        })
    }
}

/// Periodic callback driven by the event pump.
pub trait SessionTicker: Send + Sync {
    /// Called once per pump interval with the runtime clock's `now`.
    fn on_tick(&self, now: Instant);
}

use anyhow::Result;
use spool_events::Event;
use spool_torrent_core::PieceEngine;

mod memory;
mod seed;

pub use memory::{Availability, DeliveryOrder, MemorySession, MemoryTorrent};
pub use seed::load_path;

/// Engine session polled by the event pump.
///
/// Control calls come from [`PieceEngine`]; everything the engine produces is
/// drained through [`EngineSession::poll_events`].
pub trait EngineSession: PieceEngine {
    /// Drain the events produced since the previous poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn poll_events(&self) -> Result<Vec<Event>>;
}

#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Engine session adapters and the event pump that drives them.
//!
//! Layout:
//! - `session/`: the `EngineSession` trait, the in-memory session and the
//!   loopback seeder that loads local files into it.
//! - `worker.rs`: background task polling a session into the event bus.
//! - `error.rs`: adapter errors.

pub mod error;
/// Session abstraction and the in-memory implementation.
pub mod session;
/// Background worker that drains a session into the event bus.
pub mod worker;

pub use error::EngineError;
pub use session::{
    Availability, DeliveryOrder, EngineSession, MemorySession, MemoryTorrent, load_path,
};
pub use worker::EventPump;

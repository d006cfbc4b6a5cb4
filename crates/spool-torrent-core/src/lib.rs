#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Engine-agnostic piece interfaces and torrent geometry.
//!
//! Layout:
//! - `model/`: piece keys, priorities, deadlines and file layout.
//! - `service/`: the `PieceEngine` control trait and the tick hook.
//! - `error.rs`: shared error type.

pub mod error;
pub mod model;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use model::{FileEntry, PieceDeadline, PieceKey, PiecePosition, PiecePriority, TorrentLayout};
pub use service::{PieceEngine, SessionTicker};
pub use spool_events::{InfoHash, PieceIndex};

#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Piece streaming pipeline: fetch broker, per-session holding buffers and
//! the range streaming controller.
//!
//! Layout:
//! - `broker.rs`: asynchronous piece fetches with a round-robin timeout sweep.
//! - `window.rs`, `queue.rs`: sliding prefetch window and holding buffer of
//!   one session.
//! - `registry.rs`: live sessions and baseline priorities per torrent.
//! - `range.rs`: `Range` header parsing and file-to-piece planning.
//! - `controller.rs`: the streaming loop and its cleanup guard.
//! - `sink.rs`, `requests.rs`, `settings.rs`: output sinks, in-flight request
//!   tracking and tunables.
//!
//! # Design
//! - Pieces arrive as bus events in any order; each session keeps only the
//!   pieces inside its window and emits them strictly in index order.
//! - A missing piece is re-requested, never skipped: a session either sends
//!   the whole range or an exact prefix of it.
//! - Priority and deadline changes are reference counted across sessions on
//!   the same torrent and undone by the last session holding them.

pub mod broker;
pub mod controller;
pub mod error;
pub mod queue;
pub mod range;
pub mod registry;
pub mod requests;
pub mod settings;
pub mod sink;
pub mod window;

pub use broker::{PieceBroker, PieceData, PieceFetch};
pub use controller::{RangeStreamer, StreamOutcome};
pub use error::{CancelReason, FetchError, PlanError, StreamError};
pub use queue::PieceQueue;
pub use range::{RangeRequest, StreamPlan};
pub use registry::{Release, StreamRegistry};
pub use requests::{RequestHandle, RequestProgress, RequestState, RequestTracker};
pub use settings::StreamSettings;
pub use sink::{BodyChunk, ByteSink, ChannelSink, MemorySink, SinkError};
pub use window::StreamWindow;

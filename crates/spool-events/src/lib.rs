#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Typed event distribution for the Spool streaming stack.
//!
//! Layout:
//! - `payloads.rs`: event payloads, `InfoHash`, piece indices.
//! - `topics.rs`: the closed table of event kinds and raw subscription tags.
//! - `routing.rs`: the bus (observers, fan-out, abort).
//! - `waiter.rs`: one-shot waits on the next event of a kind.
//!
//! # Design
//! - Observers are held weakly and keyed by address, so an observer can
//!   unsubscribe from its own `Drop` without the bus keeping it alive.
//! - Fan-out iterates a copy of the observer list; the registry lock is
//!   released while observers run.
//! - `abort` is the single cancellation point for waiters.

pub mod error;
pub mod payloads;
pub mod routing;
pub mod topics;
pub mod waiter;

pub use error::InfoHashError;
pub use payloads::{Event, InfoHash, PieceIndex};
pub use routing::{
    EventBus, EventObserver, MAX_TAGS_PER_OBSERVER, ObserverId, Subscription, SubscriptionFlags,
};
pub use topics::{EventKind, EventTag};
pub use waiter::EventWaiter;

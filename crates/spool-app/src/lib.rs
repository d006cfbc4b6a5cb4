#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Spool application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and serving), `observers.rs`
//! (engine failure logging, dispatch counting), `error.rs`.

/// Application bootstrap and serving.
pub mod bootstrap;
pub mod error;
pub mod observers;

pub use bootstrap::{Services, run_app, run_app_with, serve};
pub use error::{AppError, AppResult};

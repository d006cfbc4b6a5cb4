#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Typed configuration for the Spool server.
//!
//! Layout: `model.rs` (sections and defaults), `access.rs` (accounts,
//! permission sets, argon2 verification), `loader.rs` (JSON document plus
//! `SPOOL_*` overrides), `validate.rs` (rules and value parsing), `error.rs`.

pub mod access;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use access::{AccessConfig, Account, Authorization, PermissionSet, verify_secret};
pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_VAR, load_from_env, load_with, read_document};
pub use model::{AppConfig, EngineConfig, LoggingSection, ServerConfig, StreamingConfig};
pub use validate::{MIN_SEED_PIECE_LENGTH, validate};

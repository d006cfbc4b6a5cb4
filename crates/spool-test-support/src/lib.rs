#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (deterministic content, memory torrents, seed directories),
//! credentials.rs (deterministic argon2 hashes for access tests).

pub mod credentials;
pub mod fixtures;

#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! HTTP surface of the Spool server.
//!
//! Layout:
//! - `http/router.rs`: `ApiServer`, layer stack and route table.
//! - `http/download.rs`: `/download` and `/proxy` range streaming.
//! - `http/auth.rs`: Basic authentication and permission checks.
//! - `http/health.rs`: `/health`, `/metrics`, `/debug/requests`.
//! - `http/errors.rs`: problem documents.
//! - `models.rs`: response payloads; `state.rs`: shared handler state.
//!
//! # Design
//! - Handlers only translate between HTTP and `spool-stream`; the streaming
//!   session runs in its own task and feeds the response body through a
//!   bounded channel.
//! - Every error leaves as an `application/problem+json` document.

pub mod error;
pub mod http;
pub mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{HealthResponse, ProblemDetails, RequestEntry, RequestsResponse};

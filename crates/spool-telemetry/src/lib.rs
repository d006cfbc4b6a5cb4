#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Telemetry primitives shared across the Spool workspace.
//!
//! Layout:
//! - `init.rs`: tracing subscriber installation and build metadata.
//! - `metrics.rs`: Prometheus registry for HTTP, event and stream metrics.
//! - `context.rs`: application span guard, task-local request context and
//!   the request-id layers.
//! - `error.rs`: `TelemetryError`.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{
    GlobalContextGuard, RequestContext, propagate_request_id_layer, set_request_id_layer,
};
pub use error::{MetricStage, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_filter};
pub use metrics::{Metrics, MetricsSnapshot};

//! Wire payloads returned by the HTTP surface.

use serde::{Deserialize, Serialize};
use spool_stream::RequestProgress;
use spool_telemetry::MetricsSnapshot;

/// RFC 9457 problem document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the server answers.
    pub status: &'static str,
    /// Build identifier.
    pub build: String,
    /// Live stream sessions.
    pub active_sessions: usize,
    /// Selected metrics.
    pub metrics: MetricsSnapshot,
}

/// Body of `GET /debug/requests`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestsResponse {
    /// In-flight downloads, oldest first.
    pub requests: Vec<RequestEntry>,
}

/// One in-flight download with its completion percentage.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEntry {
    /// Tracked progress.
    #[serde(flatten)]
    pub progress: RequestProgress,
    /// Share of the requested range already sent, `0.0..=100.0`.
    pub percent_complete: f64,
}

impl From<RequestProgress> for RequestEntry {
    fn from(progress: RequestProgress) -> Self {
        let percent_complete = progress.percent_complete();
        Self {
            progress,
            percent_complete,
        }
    }
}

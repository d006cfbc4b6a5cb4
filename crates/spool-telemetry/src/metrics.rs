//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the HTTP surface and streaming
//!   pipeline report.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{MetricStage, Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_dispatched_total: IntCounterVec,
    stream_sessions_total: IntCounterVec,
    active_streams: IntGauge,
    stream_bytes_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Current number of live stream sessions.
    pub active_streams: i64,
    /// Total bytes streamed to clients.
    pub stream_bytes_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let events_dispatched_total = counter_vec(
            "events_dispatched_total",
            "Engine events dispatched on the bus by kind",
            &["kind"],
        )?;
        let stream_sessions_total = counter_vec(
            "stream_sessions_total",
            "Finished stream sessions by outcome",
            &["outcome"],
        )?;
        let active_streams = IntGauge::with_opts(Opts::new(
            "active_streams",
            "Number of live stream sessions",
        ))
        .map_err(|source| TelemetryError::Metric {
            name: "active_streams",
            stage: MetricStage::Build,
            source,
        })?;
        let stream_bytes_total = IntCounter::with_opts(Opts::new(
            "stream_bytes_total",
            "Bytes streamed to clients",
        ))
        .map_err(|source| TelemetryError::Metric {
            name: "stream_bytes_total",
            stage: MetricStage::Build,
            source,
        })?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "events_dispatched_total", &events_dispatched_total)?;
        register(&registry, "stream_sessions_total", &stream_sessions_total)?;
        register(&registry, "active_streams", &active_streams)?;
        register(&registry, "stream_bytes_total", &stream_bytes_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_dispatched_total,
                stream_sessions_total,
                active_streams,
                stream_bytes_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the dispatched event counter for an event kind.
    pub fn inc_event(&self, kind: &str) {
        self.inner
            .events_dispatched_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a stream session starting.
    pub fn stream_started(&self) {
        self.inner.active_streams.inc();
    }

    /// Record a stream session ending with `outcome` after sending `bytes`.
    pub fn stream_finished(&self, outcome: &str, bytes: u64) {
        self.inner.active_streams.dec();
        self.inner.stream_bytes_total.inc_by(bytes);
        self.inner
            .stream_sessions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_streams: self.inner.active_streams.get(),
            stream_bytes_total: self.inner.stream_bytes_total.get(),
        }
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::Metric {
            name,
            stage: MetricStage::Build,
            source,
        })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Metric {
            name,
            stage: MetricStage::Register,
            source,
        })
}

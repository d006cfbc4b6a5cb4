//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step of collector setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStage {
    /// Constructing the collector from its options.
    Build,
    /// Adding the collector to the registry.
    Register,
}

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// The configured filter directive does not parse.
    LogFilter {
        /// Directive as configured.
        directive: String,
        /// Parser error.
        source: ParseError,
    },
    /// A global subscriber was already installed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: TryInitError,
    },
    /// Setting up one collector failed.
    Metric {
        /// Metric name.
        name: &'static str,
        /// Failed step.
        stage: MetricStage,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoding the registry in text format failed.
    MetricsEncode {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The encoder produced bytes that are not UTF-8.
    MetricsUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogFilter { .. } => formatter.write_str("invalid log filter directive"),
            Self::SubscriberInstall { .. } => {
                formatter.write_str("could not install tracing subscriber")
            }
            Self::Metric {
                stage: MetricStage::Build,
                ..
            } => formatter.write_str("could not build metric"),
            Self::Metric {
                stage: MetricStage::Register,
                ..
            } => formatter.write_str("could not register metric"),
            Self::MetricsEncode { .. } => formatter.write_str("could not encode metrics"),
            Self::MetricsUtf8 { .. } => formatter.write_str("encoded metrics are not utf-8"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LogFilter { source, .. } => Some(source),
            Self::SubscriberInstall { source } => Some(source),
            Self::Metric { source, .. } | Self::MetricsEncode { source } => Some(source),
            Self::MetricsUtf8 { source } => Some(source),
        }
    }
}

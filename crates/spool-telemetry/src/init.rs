//! Subscriber installation, log format selection and build metadata.
//!
//! # Design
//! - `LoggingConfig::level` is a complete filter directive; configuration
//!   loading has already merged `RUST_LOG` into it.
//! - The build SHA is recorded once and read by every span that carries it.

use std::str::FromStr;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Filter used when nothing else is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns an error if `config.level` is not a valid filter directive or a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let filter = log_filter(config.level)?;
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Parse a filter directive such as `info` or `spool_stream=debug,info`.
///
/// # Errors
///
/// Returns [`TelemetryError::LogFilter`] when the directive does not parse.
pub fn log_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive.trim()).map_err(|source| TelemetryError::LogFilter {
        directive: directive.to_string(),
        source,
    })
}

/// Build identifier recorded by [`init_logging`]; `dev` before that.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Filter directive.
    pub level: &'a str,
    /// Output format.
    pub format: LogFormat,
    /// Build identifier recorded in the app span.
    pub build_sha: &'a str,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: option_env!("SPOOL_BUILD_SHA").unwrap_or("dev"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Compact human-readable lines.
    #[serde(alias = "text")]
    Pretty,
}

impl LogFormat {
    /// `pretty` in debug builds, `json` in release builds.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_variants() {
        let cases = [
            ("json", Ok(LogFormat::Json)),
            (" Pretty ", Ok(LogFormat::Pretty)),
            ("text", Ok(LogFormat::Pretty)),
            ("yaml", Err("yaml".to_string())),
        ];
        for (raw, expected) in cases {
            assert_eq!(raw.parse::<LogFormat>(), expected, "{raw}");
        }
    }

    #[test]
    fn filter_directives_are_checked() {
        for directive in ["info", "spool_stream=debug,warn", " trace "] {
            assert!(log_filter(directive).is_ok(), "{directive}");
        }
        assert!(matches!(
            log_filter("spool_api=chatty"),
            Err(TelemetryError::LogFilter { directive, .. }) if directive == "spool_api=chatty"
        ));
    }

    #[test]
    fn second_install_fails() {
        let config = LoggingConfig {
            level: "info",
            format: LogFormat::Pretty,
            build_sha: "test",
        };
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::SubscriberInstall { .. })
        ));
        assert_eq!(build_sha(), "test");
    }
}

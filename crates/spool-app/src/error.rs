//! Startup and serving failures of the `spool` binary.
//!
//! Each variant names the failing operation and wraps the crate error that
//! caused it; messages stay constant.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: spool_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: spool_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: spool_telemetry::TelemetryError,
    },
    /// Loopback content could not be loaded.
    #[error("seed content could not be loaded")]
    Seed {
        /// Seed path from the configuration.
        path: PathBuf,
        /// Source engine error.
        source: spool_engine::EngineError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: spool_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: spool_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: spool_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}

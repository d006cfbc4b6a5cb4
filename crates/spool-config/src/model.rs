//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; loading lives in `loader.rs`, checks in `validate.rs`.
//! - Every section has defaults so a partial document is enough.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spool_stream::StreamSettings;
use spool_telemetry::{DEFAULT_LOG_LEVEL, LogFormat};
use spool_torrent_core::PiecePriority;

use crate::access::AccessConfig;

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Streaming pipeline tunables.
    pub streaming: StreamingConfig,
    /// Engine session settings.
    pub engine: EngineConfig,
    /// Authentication.
    pub access: AccessConfig,
    /// Log output.
    pub logging: LoggingSection,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the API binds to.
    pub bind_addr: SocketAddr,
    /// Send `Content-Disposition: attachment` with downloads.
    pub attachment: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8090)),
            attachment: true,
        }
    }
}

/// Streaming pipeline tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Bytes of look-ahead each session keeps requested.
    pub prefetch_budget_bytes: u64,
    /// Priority (1..=7) given to pieces of an active range.
    pub elevated_priority: u8,
    /// Deadline spacing between consecutive pieces.
    pub deadline_step_ms: u64,
    /// Length of one wait for the next piece.
    pub piece_wait_ms: u64,
    /// How long a piece may stay missing before the session fails.
    pub piece_stall_secs: u64,
    /// Timeout of each broker fetch.
    pub fetch_timeout_secs: u64,
    /// Pause between attempts to write into a full response body.
    pub write_backoff_ms: u64,
    /// How long the response body may stay full before the session fails.
    pub write_stall_secs: u64,
    /// Chunks buffered between the streaming task and the HTTP body.
    pub channel_depth: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            prefetch_budget_bytes: 20 * 1024 * 1024,
            elevated_priority: PiecePriority::ELEVATED.get(),
            deadline_step_ms: 100,
            piece_wait_ms: 500,
            piece_stall_secs: 120,
            fetch_timeout_secs: 60,
            write_backoff_ms: 100,
            write_stall_secs: 30,
            channel_depth: 8,
        }
    }
}

impl StreamingConfig {
    /// Runtime settings for the range streamer.
    ///
    /// Out-of-range priorities fall back to [`PiecePriority::ELEVATED`];
    /// validated configurations never hit that path.
    #[must_use]
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            prefetch_budget_bytes: self.prefetch_budget_bytes,
            elevated_priority: PiecePriority::new(self.elevated_priority)
                .unwrap_or(PiecePriority::ELEVATED),
            deadline_step: Duration::from_millis(self.deadline_step_ms),
            piece_wait_slice: Duration::from_millis(self.piece_wait_ms),
            piece_stall_timeout: Duration::from_secs(self.piece_stall_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            write_retry_backoff: Duration::from_millis(self.write_backoff_ms),
            write_stall_timeout: Duration::from_secs(self.write_stall_secs),
        }
    }
}

/// Engine session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Interval between event polls.
    pub poll_interval_ms: u64,
    /// Local file or directory served in loopback mode.
    pub seed_dir: Option<PathBuf>,
    /// Piece length of the loopback torrent.
    pub seed_piece_length: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            seed_dir: None,
            seed_piece_length: 16 * 1024,
        }
    }
}

impl EngineConfig {
    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::infer(),
        }
    }
}

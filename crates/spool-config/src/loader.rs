//! Configuration loading from an optional JSON document and the environment.
//!
//! Precedence: defaults, then the document named by `SPOOL_CONFIG`, then
//! individual `SPOOL_*` variables. The merged result is validated once.

use std::fs;
use std::path::{Path, PathBuf};

use spool_telemetry::LogFormat;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;
use crate::validate::{parse_bool, parse_value, validate};

/// Variable naming the JSON configuration document.
pub const CONFIG_PATH_VAR: &str = "SPOOL_CONFIG";

const INTEGER: &str = "must be an integer";

/// Load the configuration from the process environment.
///
/// # Errors
///
/// Returns an error if the document cannot be read or decoded, an override
/// does not parse, or the merged configuration is invalid.
pub fn load_from_env() -> ConfigResult<AppConfig> {
    load_with(|key| std::env::var(key).ok())
}

/// Load the configuration using `lookup` to resolve variables.
///
/// # Errors
///
/// See [`load_from_env`].
pub fn load_with<F>(lookup: F) -> ConfigResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_PATH_VAR).filter(|path| !path.trim().is_empty()) {
        Some(path) => read_document(Path::new(path.trim()))?,
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &lookup)?;
    validate(&config)?;
    debug!(
        bind_addr = %config.server.bind_addr,
        seed_dir = ?config.engine.seed_dir,
        "configuration loaded"
    );
    Ok(config)
}

/// Decode a JSON configuration document without applying overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid document.
pub fn read_document(path: &Path) -> ConfigResult<AppConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Document {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(raw) = var("SPOOL_BIND_ADDR") {
        config.server.bind_addr = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr { value: raw.clone() })?;
    }
    if let Some(raw) = var("SPOOL_ATTACHMENT") {
        config.server.attachment = parse_bool("server", "attachment", &raw)?;
    }

    let streaming = &mut config.streaming;
    if let Some(raw) = var("SPOOL_PREFETCH_BYTES") {
        streaming.prefetch_budget_bytes =
            parse_value("streaming", "prefetch_budget_bytes", &raw, INTEGER)?;
    }
    if let Some(raw) = var("SPOOL_ELEVATED_PRIORITY") {
        streaming.elevated_priority = parse_value(
            "streaming",
            "elevated_priority",
            &raw,
            "must be between 1 and 7",
        )?;
    }
    for (key, field, slot) in [
        ("SPOOL_DEADLINE_STEP_MS", "deadline_step_ms", &mut streaming.deadline_step_ms),
        ("SPOOL_PIECE_WAIT_MS", "piece_wait_ms", &mut streaming.piece_wait_ms),
        ("SPOOL_PIECE_STALL_SECS", "piece_stall_secs", &mut streaming.piece_stall_secs),
        ("SPOOL_FETCH_TIMEOUT_SECS", "fetch_timeout_secs", &mut streaming.fetch_timeout_secs),
        ("SPOOL_WRITE_BACKOFF_MS", "write_backoff_ms", &mut streaming.write_backoff_ms),
        ("SPOOL_WRITE_STALL_SECS", "write_stall_secs", &mut streaming.write_stall_secs),
    ] {
        if let Some(raw) = var(key) {
            *slot = parse_value("streaming", field, &raw, INTEGER)?;
        }
    }
    if let Some(raw) = var("SPOOL_CHANNEL_DEPTH") {
        streaming.channel_depth = parse_value("streaming", "channel_depth", &raw, INTEGER)?;
    }

    if let Some(raw) = var("SPOOL_POLL_INTERVAL_MS") {
        config.engine.poll_interval_ms = parse_value("engine", "poll_interval_ms", &raw, INTEGER)?;
    }
    if let Some(raw) = var("SPOOL_SEED_DIR") {
        config.engine.seed_dir = Some(PathBuf::from(raw.trim()));
    }
    if let Some(raw) = var("SPOOL_SEED_PIECE_LENGTH") {
        config.engine.seed_piece_length =
            parse_value("engine", "seed_piece_length", &raw, INTEGER)?;
    }

    if let Some(raw) = var("SPOOL_LOG_LEVEL").or_else(|| var("RUST_LOG")) {
        config.logging.level = raw.trim().to_string();
    }
    if let Some(raw) = var("SPOOL_LOG_FORMAT") {
        config.logging.format = raw
            .parse::<LogFormat>()
            .map_err(|_| ConfigError::InvalidField {
                section: "logging",
                field: "format",
                value: Some(raw.clone()),
                reason: "must be json or pretty",
            })?;
    }
    Ok(())
}

//! Validation helpers and parsing utilities for configuration values.

use std::collections::BTreeSet;
use std::str::FromStr;

use argon2::password_hash::PasswordHash;

use crate::access::AccessConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Smallest piece length accepted for loopback torrents.
pub const MIN_SEED_PIECE_LENGTH: u32 = 16 * 1024;

/// Check a fully merged configuration.
///
/// # Errors
///
/// Returns the first rule the configuration violates.
pub fn validate(config: &AppConfig) -> ConfigResult<()> {
    let streaming = &config.streaming;
    if !(1..=7).contains(&streaming.elevated_priority) {
        return Err(invalid(
            "streaming",
            "elevated_priority",
            streaming.elevated_priority,
            "must be between 1 and 7",
        ));
    }
    for (field, value) in [
        ("deadline_step_ms", streaming.deadline_step_ms),
        ("piece_wait_ms", streaming.piece_wait_ms),
        ("piece_stall_secs", streaming.piece_stall_secs),
        ("fetch_timeout_secs", streaming.fetch_timeout_secs),
        ("write_backoff_ms", streaming.write_backoff_ms),
        ("write_stall_secs", streaming.write_stall_secs),
    ] {
        if value == 0 {
            return Err(invalid("streaming", field, value, "must be greater than zero"));
        }
    }
    if streaming.channel_depth == 0 {
        return Err(invalid(
            "streaming",
            "channel_depth",
            streaming.channel_depth,
            "must be at least 1",
        ));
    }

    let engine = &config.engine;
    if engine.poll_interval_ms == 0 {
        return Err(invalid(
            "engine",
            "poll_interval_ms",
            engine.poll_interval_ms,
            "must be greater than zero",
        ));
    }
    if !engine.seed_piece_length.is_power_of_two()
        || engine.seed_piece_length < MIN_SEED_PIECE_LENGTH
    {
        return Err(invalid(
            "engine",
            "seed_piece_length",
            engine.seed_piece_length,
            "must be a power of two of at least 16384",
        ));
    }

    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: "logging",
            field: "level",
            value: None,
            reason: "must not be empty",
        });
    }
    if spool_telemetry::log_filter(&config.logging.level).is_err() {
        return Err(invalid(
            "logging",
            "level",
            &config.logging.level,
            "must be a valid filter directive",
        ));
    }

    validate_access(&config.access)
}

fn validate_access(access: &AccessConfig) -> ConfigResult<()> {
    let AccessConfig::Basic { accounts } = access else {
        return Ok(());
    };
    let mut seen = BTreeSet::new();
    for account in accounts {
        if account.username.is_empty() || account.username.contains(':') {
            return Err(ConfigError::InvalidField {
                section: "access",
                field: "username",
                value: Some(account.username.clone()),
                reason: "must be non-empty and free of ':'",
            });
        }
        if !seen.insert(account.username.as_str()) {
            return Err(ConfigError::DuplicateAccount {
                username: account.username.clone(),
            });
        }
        PasswordHash::new(&account.password_hash).map_err(|detail| {
            ConfigError::StoredHashInvalid {
                username: account.username.clone(),
                detail,
            }
        })?;
    }
    Ok(())
}

/// Parse a raw override value for `section.field`.
pub(crate) fn parse_value<T: FromStr>(
    section: &'static str,
    field: &'static str,
    raw: &str,
    reason: &'static str,
) -> ConfigResult<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidField {
        section,
        field,
        value: Some(raw.to_string()),
        reason,
    })
}

/// Parse a boolean override; accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub(crate) fn parse_bool(
    section: &'static str,
    field: &'static str,
    raw: &str,
) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidField {
            section,
            field,
            value: Some(raw.to_string()),
            reason: "must be a boolean",
        }),
    }
}

fn invalid(
    section: &'static str,
    field: &'static str,
    value: impl ToString,
    reason: &'static str,
) -> ConfigError {
    ConfigError::InvalidField {
        section,
        field,
        value: Some(value.to_string()),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Account, PermissionSet};

    fn rejected_field(config: &AppConfig) -> Option<&'static str> {
        match validate(config) {
            Err(ConfigError::InvalidField { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cases: Vec<(fn(&mut AppConfig), &str)> = vec![
            (|c| c.streaming.elevated_priority = 0, "elevated_priority"),
            (|c| c.streaming.elevated_priority = 8, "elevated_priority"),
            (|c| c.streaming.deadline_step_ms = 0, "deadline_step_ms"),
            (|c| c.streaming.piece_stall_secs = 0, "piece_stall_secs"),
            (|c| c.streaming.write_stall_secs = 0, "write_stall_secs"),
            (|c| c.streaming.channel_depth = 0, "channel_depth"),
            (|c| c.engine.poll_interval_ms = 0, "poll_interval_ms"),
            (|c| c.engine.seed_piece_length = 8 * 1024, "seed_piece_length"),
            (|c| c.engine.seed_piece_length = 20_000, "seed_piece_length"),
            (|c| c.logging.level = "  ".into(), "level"),
            (|c| c.logging.level = "spool_stream=loud".into(), "level"),
        ];
        for (mutate, field) in cases {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert_eq!(rejected_field(&config), Some(field));
        }
    }

    #[test]
    fn accounts_are_checked() {
        let account = |name: &str, hash: &str| Account {
            username: name.into(),
            password_hash: hash.into(),
            permissions: PermissionSet::FULL,
        };
        let phc = "$argon2id$v=19$m=19456,t=2,p=1$c3Bvb2wtdGVzdC1zYWx0$YWJjZGVmZ2hpamtsbW5vcHFyc3R1dnd4eXo";

        let mut config = AppConfig::default();
        config.access = AccessConfig::Basic {
            accounts: vec![account("ana", phc), account("ana", phc)],
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::DuplicateAccount { .. })
        ));

        config.access = AccessConfig::Basic {
            accounts: vec![account("a:b", phc)],
        };
        assert_eq!(rejected_field(&config), Some("username"));

        config.access = AccessConfig::Basic {
            accounts: vec![account("ana", "plaintext")],
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::StoredHashInvalid { .. })
        ));

        config.access = AccessConfig::Basic {
            accounts: vec![account("ana", phc)],
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn override_values_parse() {
        let cases = [
            (" Yes ", Some(true)),
            ("on", Some(true)),
            ("0", Some(false)),
            ("FALSE", Some(false)),
            ("maybe", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_bool("server", "attachment", raw).ok(), expected, "{raw}");
        }

        let depth: Option<usize> =
            parse_value("streaming", "channel_depth", " 16 ", "must be an integer").ok();
        assert_eq!(depth, Some(16));
        assert!(matches!(
            parse_value::<u64>("streaming", "piece_wait_ms", "soon", "must be an integer"),
            Err(ConfigError::InvalidField {
                field: "piece_wait_ms",
                reason: "must be an integer",
                ..
            })
        ));
    }
}

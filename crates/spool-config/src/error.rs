//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use argon2::password_hash::Error as PasswordHashError;
use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Bind address value was invalid.
    #[error("invalid bind address")]
    InvalidBindAddr {
        /// Bind address payload provided by the caller.
        value: String,
    },
    /// Two accounts share a username.
    #[error("duplicate account")]
    DuplicateAccount {
        /// Username declared more than once.
        username: String,
    },
    /// Stored secret hash payload was invalid.
    #[error("invalid stored hash")]
    StoredHashInvalid {
        /// Account owning the hash.
        username: String,
        /// Hash parsing error detail.
        detail: PasswordHashError,
    },
    /// Secret verification failed.
    #[error("failed to verify secret")]
    SecretVerifyFailed {
        /// Verification error detail.
        detail: PasswordHashError,
    },
    /// Configuration document could not be decoded.
    #[error("invalid configuration document")]
    Document {
        /// Path of the document.
        path: PathBuf,
        /// Decoder error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_constant() {
        let cases = [
            (
                ConfigError::InvalidField {
                    section: "streaming",
                    field: "channel_depth",
                    value: Some("0".into()),
                    reason: "must be at least 1",
                },
                "invalid configuration field",
            ),
            (
                ConfigError::InvalidBindAddr {
                    value: "nope".into(),
                },
                "invalid bind address",
            ),
            (
                ConfigError::DuplicateAccount {
                    username: "ana".into(),
                },
                "duplicate account",
            ),
            (
                ConfigError::SecretVerifyFailed {
                    detail: PasswordHashError::Algorithm,
                },
                "failed to verify secret",
            ),
            (
                ConfigError::Io {
                    operation: "config.read",
                    path: PathBuf::from("/missing"),
                    source: io::Error::other("boom"),
                },
                "filesystem operation failed",
            ),
        ];
        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
        }
    }
}

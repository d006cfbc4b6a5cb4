//! Access control: permission sets, accounts and credential checks.
//!
//! # Design
//! - Permission sets are plain values carried by each account; nothing is
//!   global.
//! - Only argon2 PHC hashes are stored; plaintext secrets never enter the
//!   configuration.

use argon2::password_hash::{Error as PasswordHashError, PasswordHash, PasswordVerifier};
use argon2::Argon2;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Operations a caller may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    /// Download file data through `/download` and `/proxy`.
    #[serde(default)]
    pub get_data: bool,
    /// Inspect server state such as in-flight requests.
    #[serde(default)]
    pub list: bool,
}

impl PermissionSet {
    /// Every permission.
    pub const FULL: Self = Self {
        get_data: true,
        list: true,
    };
    /// Data access only.
    pub const READ_ONLY: Self = Self {
        get_data: true,
        list: false,
    };
    /// No permission at all.
    pub const NONE: Self = Self {
        get_data: false,
        list: false,
    };
}

/// A Basic-auth account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Login name.
    pub username: String,
    /// Argon2 PHC string of the password.
    pub password_hash: String,
    /// Operations granted to the account.
    #[serde(default = "default_permissions")]
    pub permissions: PermissionSet,
}

const fn default_permissions() -> PermissionSet {
    PermissionSet::READ_ONLY
}

/// How callers are authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AccessConfig {
    /// No authentication; every caller holds [`PermissionSet::FULL`].
    #[default]
    Open,
    /// HTTP Basic authentication against the listed accounts.
    Basic {
        /// Known accounts.
        #[serde(default)]
        accounts: Vec<Account>,
    },
}

/// Outcome of checking a caller's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Caller is known and holds these permissions.
    Granted(PermissionSet),
    /// Credentials are missing or wrong.
    Denied,
}

impl AccessConfig {
    /// Whether callers must present credentials.
    #[must_use]
    pub const fn requires_credentials(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }

    /// Check a `(username, password)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the matching account's stored hash is malformed or
    /// verification fails for a reason other than a wrong password.
    pub fn authorize(&self, credentials: Option<(&str, &str)>) -> ConfigResult<Authorization> {
        let accounts = match self {
            Self::Open => return Ok(Authorization::Granted(PermissionSet::FULL)),
            Self::Basic { accounts } => accounts,
        };
        let Some((username, password)) = credentials else {
            return Ok(Authorization::Denied);
        };
        let Some(account) = accounts.iter().find(|account| account.username == username) else {
            return Ok(Authorization::Denied);
        };
        if verify_secret(&account.username, &account.password_hash, password)? {
            Ok(Authorization::Granted(account.permissions))
        } else {
            Ok(Authorization::Denied)
        }
    }
}

/// Verify `candidate` against an argon2 PHC string.
///
/// # Errors
///
/// Returns an error if `hash` is not a valid PHC string or verification fails
/// for a reason other than a mismatch.
pub fn verify_secret(username: &str, hash: &str, candidate: &str) -> ConfigResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|detail| ConfigError::StoredHashInvalid {
        username: username.to_string(),
        detail,
    })?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(detail) => Err(ConfigError::SecretVerifyFailed { detail }),
    }
}

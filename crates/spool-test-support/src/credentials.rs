//! Password hashes for access-control tests.

use anyhow::{Result, anyhow};
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;

const FIXED_SALT: &str = "c3Bvb2wtdGVzdC1zYWx0";

/// Argon2id PHC string for `secret`, salted deterministically.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn argon2_hash(secret: &str) -> Result<String> {
    let salt = SaltString::from_b64(FIXED_SALT).map_err(|err| anyhow!("invalid salt: {err}"))?;
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash secret: {err}"))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_phc_strings() -> Result<()> {
        let first = argon2_hash("hunter2")?;
        assert!(first.starts_with("$argon2id$"));
        assert_eq!(first, argon2_hash("hunter2")?);
        assert_ne!(first, argon2_hash("hunter3")?);
        Ok(())
    }
}

use std::fs;

use anyhow::Result;
use serde_json::json;
use spool_config::{
    AccessConfig, Authorization, CONFIG_PATH_VAR, ConfigError, PermissionSet, load_with,
};
use spool_test_support::credentials::argon2_hash;

#[test]
fn document_and_environment_are_merged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("spool.json");
    let document = json!({
        "server": { "bind_addr": "127.0.0.1:7000", "attachment": false },
        "streaming": { "channel_depth": 4, "deadline_step_ms": 50 },
        "access": {
            "mode": "basic",
            "accounts": [
                {
                    "username": "admin",
                    "password_hash": argon2_hash("admin-pass")?,
                    "permissions": { "get_data": true, "list": true }
                },
                {
                    "username": "guest",
                    "password_hash": argon2_hash("guest-pass")?
                }
            ]
        }
    });
    fs::write(&path, serde_json::to_vec_pretty(&document)?)?;

    let path_value = path.to_string_lossy().into_owned();
    let config = load_with(|key| match key {
        CONFIG_PATH_VAR => Some(path_value.clone()),
        "SPOOL_BIND_ADDR" => Some("127.0.0.1:7100".to_string()),
        _ => None,
    })?;

    assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:7100");
    assert!(!config.server.attachment);
    assert_eq!(config.streaming.channel_depth, 4);
    assert_eq!(config.streaming.deadline_step_ms, 50);
    assert_eq!(config.streaming.piece_wait_ms, 500);

    let access = &config.access;
    assert!(matches!(access, AccessConfig::Basic { accounts } if accounts.len() == 2));
    assert_eq!(
        access.authorize(Some(("admin", "admin-pass")))?,
        Authorization::Granted(PermissionSet::FULL)
    );
    assert_eq!(
        access.authorize(Some(("guest", "guest-pass")))?,
        Authorization::Granted(PermissionSet::READ_ONLY)
    );
    assert_eq!(
        access.authorize(Some(("guest", "admin-pass")))?,
        Authorization::Denied
    );
    Ok(())
}

#[test]
fn malformed_documents_are_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cases = [
        ("not json", "document"),
        (r#"{"streaming":{"turbo":true}}"#, "document"),
        (r#"{"engine":{"seed_piece_length":1000}}"#, "invalid"),
        (
            r#"{"access":{"mode":"basic","accounts":[{"username":"a","password_hash":"x"}]}}"#,
            "hash",
        ),
    ];
    for (index, (body, kind)) in cases.into_iter().enumerate() {
        let path = dir.path().join(format!("case-{index}.json"));
        fs::write(&path, body)?;
        let path_value = path.to_string_lossy().into_owned();
        let result = load_with(|key| (key == CONFIG_PATH_VAR).then(|| path_value.clone()));
        let matched = match (&result, kind) {
            (Err(ConfigError::Document { .. }), "document")
            | (Err(ConfigError::InvalidField { .. }), "invalid")
            | (Err(ConfigError::StoredHashInvalid { .. }), "hash") => true,
            _ => false,
        };
        assert!(matched, "case {index}: {result:?}");
    }
    Ok(())
}

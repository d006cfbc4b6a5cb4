//! Basic authentication and permission checks.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use spool_config::{Authorization, PermissionSet};
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Caller identity attached to authorised requests.
#[derive(Debug, Clone)]
pub(crate) struct AuthContext {
    pub(crate) username: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Required {
    GetData,
    List,
}

impl Required {
    const fn granted_by(self, permissions: PermissionSet) -> bool {
        match self {
            Self::GetData => permissions.get_data,
            Self::List => permissions.list,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::GetData => "get_data",
            Self::List => "list",
        }
    }
}

pub(crate) async fn require_data_access(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, req, next, Required::GetData).await
}

pub(crate) async fn require_list_access(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, req, next, Required::List).await
}

async fn authorize(
    state: &ApiState,
    mut req: Request,
    next: Next,
    required: Required,
) -> Result<Response, ApiError> {
    let (username, verdict) = if state.access.requires_credentials() {
        let (username, password) = basic_credentials(req.headers())?;
        let access = Arc::clone(&state.access);
        let candidate = username.clone();
        let verdict = tokio::task::spawn_blocking(move || {
            access.authorize(Some((candidate.as_str(), password.as_str())))
        })
        .await
        .map_err(|err| {
            error!(error = %err, "credential check task failed");
            ApiError::internal("failed to verify credentials")
        })?;
        (Some(username), verdict)
    } else {
        (None, state.access.authorize(None))
    };
    let verdict = verdict.map_err(|err| {
        error!(error = %err, user = ?username, "failed to verify credentials");
        ApiError::internal("failed to verify credentials")
    })?;

    let Authorization::Granted(permissions) = verdict else {
        warn!(user = ?username, "rejected credentials");
        return Err(ApiError::unauthorized("invalid username or password"));
    };
    if !required.granted_by(permissions) {
        warn!(user = ?username, permission = required.name(), "permission denied");
        return Err(ApiError::forbidden(format!(
            "missing the {} permission",
            required.name()
        )));
    }

    req.extensions_mut().insert(AuthContext { username });
    Ok(next.run(req).await)
}

fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing credentials"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("authorization header must be ASCII"))?;
    let (scheme, encoded) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ApiError::unauthorized("malformed authorization header"))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(ApiError::unauthorized("only Basic authentication is supported"));
    }
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| ApiError::unauthorized("malformed Basic credentials"))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| ApiError::unauthorized("malformed Basic credentials"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ApiError::unauthorized("malformed Basic credentials"))?;
    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    #[test]
    fn basic_credentials_are_decoded() {
        let encoded = STANDARD.encode("ana:pa:ss");
        let parsed = basic_credentials(&headers(&format!("basic {encoded}")));
        assert_eq!(
            parsed.ok(),
            Some(("ana".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn malformed_credentials_are_unauthorized() {
        let cases = [
            String::new(),
            "Bearer abc".to_string(),
            "Basic".to_string(),
            "Basic !!!".to_string(),
            format!("Basic {}", STANDARD.encode("no-colon")),
        ];
        for value in cases {
            let result = basic_credentials(&headers(&value));
            assert!(
                matches!(&result, Err(err) if err.status == axum::http::StatusCode::UNAUTHORIZED),
                "{value:?}"
            );
        }
    }

    #[test]
    fn permissions_map_to_requirements() {
        assert!(Required::GetData.granted_by(PermissionSet::READ_ONLY));
        assert!(!Required::List.granted_by(PermissionSet::READ_ONLY));
        assert!(Required::List.granted_by(PermissionSet::FULL));
        assert!(!Required::GetData.granted_by(PermissionSet::NONE));
    }
}

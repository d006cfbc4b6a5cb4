//! RFC 9457-style API error wrapper.

use axum::{
    Json,
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_RANGE, CONTENT_TYPE, WWW_AUTHENTICATE},
    },
    response::{IntoResponse, Response},
};

use crate::http::constants::{
    BASIC_REALM, PROBLEM_BAD_REQUEST, PROBLEM_CONTENT_TYPE, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL,
    PROBLEM_NOT_FOUND, PROBLEM_RANGE_NOT_SATISFIABLE, PROBLEM_UNAUTHORIZED,
};
use crate::models::ProblemDetails;

/// Structured API error with optional RFC 9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    challenge: bool,
    file_size: Option<u64>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            challenge: false,
            file_size: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        let mut error = Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail);
        error.challenge = true;
        error
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn range_not_satisfiable(file_size: u64) -> Self {
        let mut error = Self::new(
            StatusCode::RANGE_NOT_SATISFIABLE,
            PROBLEM_RANGE_NOT_SATISFIABLE,
            "range not satisfiable",
        )
        .with_detail(format!("file is {file_size} bytes long"));
        error.file_size = Some(file_size);
        error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        let mut response = (self.status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        if self.challenge {
            headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_REALM));
        }
        if let Some(size) = self.file_size
            && let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}"))
        {
            headers.insert(CONTENT_RANGE, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_responses_carry_their_headers() {
        let cases = [
            (ApiError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR, None, None),
            (ApiError::bad_request("bad"), StatusCode::BAD_REQUEST, None, None),
            (ApiError::not_found("gone"), StatusCode::NOT_FOUND, None, None),
            (ApiError::forbidden("no"), StatusCode::FORBIDDEN, None, None),
            (
                ApiError::unauthorized("who"),
                StatusCode::UNAUTHORIZED,
                Some(BASIC_REALM),
                None,
            ),
            (
                ApiError::range_not_satisfiable(100_000),
                StatusCode::RANGE_NOT_SATISFIABLE,
                None,
                Some("bytes */100000"),
            ),
        ];
        for (error, status, challenge, content_range) in cases {
            let response = error.into_response();
            assert_eq!(response.status(), status);
            let headers = response.headers();
            assert_eq!(
                headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
                Some(PROBLEM_CONTENT_TYPE)
            );
            assert_eq!(
                headers.get(WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
                challenge
            );
            assert_eq!(
                headers.get(CONTENT_RANGE).and_then(|v| v.to_str().ok()),
                content_range
            );
        }
    }
}

//! HTTP metrics middleware for request counting.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use spool_telemetry::RequestContext;

use crate::http::constants::HEADER_REQUEST_ID;
use crate::state::ApiState;

/// Count every response by matched route and status, with the request
/// context in scope for the handler.
pub(crate) async fn track_requests(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    let route = req.extensions().get::<MatchedPath>().map_or_else(
        || req.uri().path().to_string(),
        |matched| matched.as_str().to_string(),
    );
    let request_id = req
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let response = RequestContext::new(request_id, route.clone())
        .scope(next.run(req))
        .await;
    state
        .telemetry
        .inc_http_request(&route, response.status().as_u16());
    response
}

//! Router construction and server host for the API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::Request,
    middleware,
    routing::get,
};
use spool_config::AppConfig;
use spool_stream::RangeStreamer;
use spool_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{Span, info};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::auth::{require_data_access, require_list_access};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::download::download;
use crate::http::health::{debug_requests, health, metrics};
use crate::http::telemetry::track_requests;
use crate::state::ApiState;

/// Axum router wrapper that hosts the Spool HTTP surface.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router over `streamer` with the server, streaming and
    /// access sections of `config`.
    #[must_use]
    pub fn new(streamer: Arc<RangeStreamer>, config: &AppConfig, telemetry: Metrics) -> Self {
        let state = Arc::new(ApiState::new(streamer, config, telemetry));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(spool_telemetry::set_request_id_layer())
            .layer(spool_telemetry::propagate_request_id_layer())
            .layer(trace_layer);

        let router = Self::build_router(&state)
            .route_layer(middleware::from_fn_with_state(
                Arc::clone(&state),
                track_requests,
            ))
            .route_layer(layered)
            .with_state(state);
        Self { router }
    }

    fn build_router(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
        let require_data = middleware::from_fn_with_state(Arc::clone(state), require_data_access);
        let require_list = middleware::from_fn_with_state(Arc::clone(state), require_list_access);

        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route(
                "/download",
                get(download).route_layer(require_data.clone()),
            )
            .route("/proxy", get(download).route_layer(require_data))
            .route(
                "/debug/requests",
                get(debug_requests).route_layer(require_list),
            )
    }

    /// Bind a listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr) -> ApiServerResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server terminates unexpectedly.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().ok();
        info!(addr = ?addr, "serving api");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { addr, source })
    }

    /// The assembled router, for embedding or in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

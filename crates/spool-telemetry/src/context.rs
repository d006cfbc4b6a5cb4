//! Application span and per-request context.
//!
//! # Design
//! - A request's id and matched route live in task-local storage for the
//!   duration of its handler; streaming tasks capture them before spawning.
//! - Request ids come from `x-request-id`: generated when absent and echoed
//!   on every response.

use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::sync::Arc;

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the process-wide `app` span entered while alive.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter an `app` span tagged with `service` and the build SHA.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", service = %service, build_sha = %build_sha()),
        ));
        Self {
            _guard: span.enter(),
        }
    }
}

/// Identity of the HTTP request being handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: Arc<str>,
    route: Arc<str>,
}

impl RequestContext {
    /// Context for a request with `request_id` on `route`.
    #[must_use]
    pub fn new(request_id: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            request_id: Arc::from(request_id.into()),
            route: Arc::from(route.into()),
        }
    }

    /// Context of the enclosing [`RequestContext::scope`], if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        ACTIVE_REQUEST.try_with(Clone::clone).ok()
    }

    /// Value of the `x-request-id` header; empty when none was set.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Matched route template.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Run `fut` with this context current.
    pub async fn scope<Fut, T>(self, fut: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        ACTIVE_REQUEST.scope(self, fut).await
    }

    /// Fill the `request_id` and `route` fields of `span`.
    pub fn record_on(&self, span: &Span) {
        span.record("request_id", tracing::field::display(&self.request_id));
        span.record("route", tracing::field::display(&self.route));
    }
}

impl Display for RequestContext {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.route, self.request_id)
    }
}

tokio::task_local! {
    static ACTIVE_REQUEST: RequestContext;
}

/// Layer that assigns a UUID `x-request-id` to requests without one.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies the request's `x-request-id` onto the response.
/// Must sit inside [`set_request_id_layer`] to see generated ids.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

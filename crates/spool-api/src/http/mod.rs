//! HTTP surface modules (router, handlers, middleware).

/// Basic authentication and permission middleware.
pub mod auth;
/// Shared constants and header names.
pub mod constants;
/// File download handlers.
pub mod download;
/// Problem response helpers and error types.
pub mod errors;
/// Health, metrics and diagnostics endpoints.
pub mod health;
/// Media types and dispositions for downloads.
pub mod mime;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;

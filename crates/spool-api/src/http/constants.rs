//! Shared HTTP constants (headers, problem URIs, realm).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const BASIC_REALM: &str = "Basic realm=\"spool\"";
pub(crate) const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";
pub(crate) const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";
pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

pub(crate) const PROBLEM_INTERNAL: &str = "https://spool.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://spool.dev/problems/unauthorized";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://spool.dev/problems/forbidden";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://spool.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://spool.dev/problems/not-found";
pub(crate) const PROBLEM_RANGE_NOT_SATISFIABLE: &str =
    "https://spool.dev/problems/range-not-satisfiable";

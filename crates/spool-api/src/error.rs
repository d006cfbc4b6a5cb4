//! Listener and server failures of the HTTP surface.
//!
//! Request-level failures never reach this type; handlers turn them into
//! problem documents.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::net::SocketAddr;

/// Result alias for [`ApiServerError`].
pub type ApiServerResult<T> = Result<T, ApiServerError>;

/// Failure to bind or keep serving the listener.
#[derive(Debug)]
pub enum ApiServerError {
    /// The listen address could not be bound.
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Socket error.
        source: io::Error,
    },
    /// The accept loop stopped with an error.
    Serve {
        /// Bound address, when the socket could still report it.
        addr: Option<SocketAddr>,
        /// Socket error.
        source: io::Error,
    },
}

impl Display for ApiServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Bind { .. } => "could not bind http listener",
            Self::Serve { .. } => "http server stopped with an error",
        })
    }
}

impl Error for ApiServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Serve { source, .. } => Some(source),
        }
    }
}

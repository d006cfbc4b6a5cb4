//! Event crate error primitives.

use std::fmt::{self, Display, Formatter};

/// Error produced when parsing an info-hash from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoHashError {
    /// Input was not exactly 40 characters long.
    InvalidLength {
        /// Length of the rejected input.
        len: usize,
    },
    /// Input contained non-hexadecimal characters.
    InvalidHex,
}

impl Display for InfoHashError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { .. } => formatter.write_str("info-hash must be 40 hex characters"),
            Self::InvalidHex => formatter.write_str("info-hash contains non-hex characters"),
        }
    }
}

impl std::error::Error for InfoHashError {}

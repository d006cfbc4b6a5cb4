//! # Design
//!
//! - Keep engine adapter error messages constant; store context in fields.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use spool_torrent_core::TorrentError;

/// Failures raised while building or driving an engine session.
#[derive(Debug)]
pub enum EngineError {
    /// Seed directory could not be read.
    SeedIo {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Seed directory walk failed.
    SeedWalk {
        /// Root being walked.
        root: PathBuf,
        /// Underlying walk error.
        source: walkdir::Error,
    },
    /// Seed directory contained no regular files.
    EmptySeed {
        /// Root that was scanned.
        root: PathBuf,
    },
    /// Seed content did not form a valid torrent layout.
    InvalidSeed {
        /// Root that was scanned.
        root: PathBuf,
        /// Layout failure.
        source: TorrentError,
    },
}

impl Display for EngineError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeedIo { .. } => formatter.write_str("seed content IO failure"),
            Self::SeedWalk { .. } => formatter.write_str("seed directory walk failed"),
            Self::EmptySeed { .. } => formatter.write_str("seed directory is empty"),
            Self::InvalidSeed { .. } => formatter.write_str("seed content has invalid layout"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SeedIo { source, .. } => Some(source),
            Self::SeedWalk { source, .. } => Some(source),
            Self::InvalidSeed { source, .. } => Some(source),
            Self::EmptySeed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn engine_error_display_and_source() {
        let cases = vec![
            (
                EngineError::SeedIo {
                    operation: "read",
                    path: PathBuf::from("seed/a"),
                    source: io::Error::other("io"),
                },
                "seed content IO failure",
                true,
            ),
            (
                EngineError::EmptySeed {
                    root: PathBuf::from("seed"),
                },
                "seed directory is empty",
                false,
            ),
            (
                EngineError::InvalidSeed {
                    root: PathBuf::from("seed"),
                    source: TorrentError::InvalidLayout { reason: "x" },
                },
                "seed content has invalid layout",
                true,
            ),
        ];

        for (err, message, has_source) in cases {
            assert_eq!(err.to_string(), message);
            assert_eq!(err.source().is_some(), has_source);
        }
    }
}

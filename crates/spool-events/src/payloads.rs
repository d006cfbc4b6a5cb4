//! Event payload types produced by the torrent engine.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InfoHashError;
use crate::topics::EventKind;

/// Zero-based index of a piece within a torrent.
pub type PieceIndex = u32;

/// 20-byte `BitTorrent` v1 info-hash identifying a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; Self::LEN]);

impl InfoHash {
    /// Number of raw bytes in an info-hash.
    pub const LEN: usize = 20;

    /// Wrap raw info-hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Raw info-hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lowercase hexadecimal rendering (40 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for InfoHash {
    type Err = InfoHashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.len() != Self::LEN * 2 {
            return Err(InfoHashError::InvalidLength { len: value.len() });
        }
        let mut raw = [0_u8; Self::LEN];
        hex::decode_to_slice(value, &mut raw).map_err(|_| InfoHashError::InvalidHex)?;
        Ok(Self(raw))
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_hex())
    }
}

impl Debug for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "InfoHash({})", self.to_hex())
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Typed engine events routed through the bus.
///
/// Piece buffers are reference counted; cloning an event never copies piece
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Piece content delivered in response to a read or an armed deadline.
    PieceRead {
        /// Torrent the piece belongs to.
        torrent: InfoHash,
        /// Piece index.
        piece: PieceIndex,
        /// Piece bytes; empty when the read failed.
        buffer: Bytes,
        /// Engine-provided failure description.
        error: Option<String>,
    },
    /// Piece completed and passed its hash check.
    PieceFinished {
        /// Torrent the piece belongs to.
        torrent: InfoHash,
        /// Piece index.
        piece: PieceIndex,
    },
    /// Torrent registered with the engine.
    TorrentAdded {
        /// Torrent identifier.
        torrent: InfoHash,
        /// Display name.
        name: String,
    },
    /// Torrent removed from the engine.
    TorrentRemoved {
        /// Torrent identifier.
        torrent: InfoHash,
    },
    /// Torrent paused; no further pieces will arrive until it resumes.
    TorrentPaused {
        /// Torrent identifier.
        torrent: InfoHash,
    },
    /// Torrent resumed after a pause.
    TorrentResumed {
        /// Torrent identifier.
        torrent: InfoHash,
    },
    /// Engine-level failure affecting a whole torrent.
    TorrentError {
        /// Torrent identifier.
        torrent: InfoHash,
        /// Engine-provided description.
        message: String,
    },
    /// Storage failure on a file inside a torrent.
    FileError {
        /// Torrent identifier.
        torrent: InfoHash,
        /// Path of the failing file relative to the torrent root.
        path: String,
        /// Engine-provided description.
        message: String,
    },
    /// Downloaded piece failed its hash check.
    HashFailed {
        /// Torrent identifier.
        torrent: InfoHash,
        /// Piece index.
        piece: PieceIndex,
    },
}

impl Event {
    /// Routing kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PieceRead { .. } => EventKind::PieceRead,
            Self::PieceFinished { .. } => EventKind::PieceFinished,
            Self::TorrentAdded { .. } => EventKind::TorrentAdded,
            Self::TorrentRemoved { .. } => EventKind::TorrentRemoved,
            Self::TorrentPaused { .. } => EventKind::TorrentPaused,
            Self::TorrentResumed { .. } => EventKind::TorrentResumed,
            Self::TorrentError { .. } => EventKind::TorrentError,
            Self::FileError { .. } => EventKind::FileError,
            Self::HashFailed { .. } => EventKind::HashFailed,
        }
    }

    /// Torrent the event refers to.
    #[must_use]
    pub const fn torrent(&self) -> InfoHash {
        match self {
            Self::PieceRead { torrent, .. }
            | Self::PieceFinished { torrent, .. }
            | Self::TorrentAdded { torrent, .. }
            | Self::TorrentRemoved { torrent }
            | Self::TorrentPaused { torrent }
            | Self::TorrentResumed { torrent }
            | Self::TorrentError { torrent, .. }
            | Self::FileError { torrent, .. }
            | Self::HashFailed { torrent, .. } => *torrent,
        }
    }
}

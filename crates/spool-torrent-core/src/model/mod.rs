//! Piece-level torrent domain types shared across the workspace.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spool_events::{InfoHash, PieceIndex};

use crate::error::{TorrentError, TorrentResult};

/// A piece within a specific torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieceKey {
    /// Owning torrent.
    pub torrent: InfoHash,
    /// Piece index.
    pub piece: PieceIndex,
}

impl PieceKey {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(torrent: InfoHash, piece: PieceIndex) -> Self {
        Self { torrent, piece }
    }
}

/// Download priority of a piece on the engine's 0..=7 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PiecePriority(u8);

impl PiecePriority {
    /// Never download.
    pub const DONT_DOWNLOAD: Self = Self(0);
    /// Lowest downloading priority.
    pub const LOW: Self = Self(1);
    /// Engine default.
    pub const DEFAULT: Self = Self(4);
    /// Raised priority used for pieces being streamed.
    pub const ELEVATED: Self = Self(5);
    /// Highest priority.
    pub const TOP: Self = Self(7);

    /// Validate a raw priority value.
    #[must_use]
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= Self::TOP.0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Raw priority value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for PiecePriority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for PiecePriority {
    type Error = TorrentError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(TorrentError::InvalidPriority { value: raw })
    }
}

impl From<PiecePriority> for u8 {
    fn from(priority: PiecePriority) -> Self {
        priority.0
    }
}

/// Soft deadline hint for a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceDeadline {
    /// Piece the deadline applies to.
    pub piece: PieceIndex,
    /// Time from now by which the piece is wanted.
    pub deadline: Duration,
    /// Emit a piece-read event with the content once the piece is available.
    pub alert_when_available: bool,
}

/// A file inside a torrent, positioned within the torrent's byte space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the torrent root, `/`-separated.
    pub path: String,
    /// Offset of the first byte within the concatenated torrent content.
    pub offset: u64,
    /// File size in bytes.
    pub size: u64,
}

impl FileEntry {
    /// Last path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Byte position expressed as a piece and an offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiecePosition {
    /// Piece containing the byte.
    pub piece: PieceIndex,
    /// Offset of the byte within the piece.
    pub offset: u32,
}

/// Static geometry of a torrent: piece length and file placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentLayout {
    /// Display name.
    pub name: String,
    /// Length of every piece except possibly the last.
    pub piece_length: u32,
    /// Sum of all file sizes.
    pub total_size: u64,
    /// Files in torrent order.
    pub files: Vec<FileEntry>,
}

impl TorrentLayout {
    /// Build a layout from `(path, size)` pairs laid out back to back.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidLayout`] when the piece length is zero,
    /// the file list is empty, or the piece count does not fit a piece index.
    pub fn new<I, P>(name: impl Into<String>, piece_length: u32, files: I) -> TorrentResult<Self>
    where
        I: IntoIterator<Item = (P, u64)>,
        P: Into<String>,
    {
        if piece_length == 0 {
            return Err(TorrentError::InvalidLayout {
                reason: "piece length must be positive",
            });
        }
        let mut offset = 0_u64;
        let mut entries = Vec::new();
        for (path, size) in files {
            entries.push(FileEntry {
                path: path.into(),
                offset,
                size,
            });
            offset = offset.checked_add(size).ok_or(TorrentError::InvalidLayout {
                reason: "total size overflows",
            })?;
        }
        if entries.is_empty() {
            return Err(TorrentError::InvalidLayout {
                reason: "torrent has no files",
            });
        }
        if PieceIndex::try_from(offset.div_ceil(u64::from(piece_length))).is_err() {
            return Err(TorrentError::InvalidLayout {
                reason: "too many pieces",
            });
        }
        Ok(Self {
            name: name.into(),
            piece_length,
            total_size: offset,
            files: entries,
        })
    }

    /// Number of pieces.
    #[must_use]
    pub fn num_pieces(&self) -> PieceIndex {
        PieceIndex::try_from(self.total_size.div_ceil(u64::from(self.piece_length)))
            .unwrap_or(PieceIndex::MAX)
    }

    /// Size of `piece` in bytes; the last piece may be short and indices past
    /// the end have size zero.
    #[must_use]
    pub fn piece_size(&self, piece: PieceIndex) -> u32 {
        let start = u64::from(piece) * u64::from(self.piece_length);
        if start >= self.total_size {
            return 0;
        }
        let remaining = self.total_size - start;
        u32::try_from(remaining.min(u64::from(self.piece_length))).unwrap_or(self.piece_length)
    }

    /// File at `index`.
    #[must_use]
    pub fn file(&self, index: usize) -> Option<&FileEntry> {
        self.files.get(index)
    }

    /// Locate byte `offset` of file `index` inside the piece space.
    #[must_use]
    pub fn map_file(&self, index: usize, offset: u64) -> Option<PiecePosition> {
        let file = self.file(index)?;
        let absolute = file.offset.checked_add(offset)?;
        let piece_length = u64::from(self.piece_length);
        Some(PiecePosition {
            piece: PieceIndex::try_from(absolute / piece_length).ok()?,
            offset: u32::try_from(absolute % piece_length).ok()?,
        })
    }
}

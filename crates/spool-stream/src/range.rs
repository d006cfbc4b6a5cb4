//! HTTP `Range` parsing and file-to-piece planning.

use spool_torrent_core::{InfoHash, PieceIndex, TorrentLayout};

use crate::error::PlanError;

/// Byte range requested by the client, before validation against a file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable `Range` header; serve the whole file.
    Full,
    /// `bytes=first-last` or `bytes=first-` (`last` open).
    Span {
        /// First byte, inclusive.
        first: u64,
        /// Last byte, inclusive; `None` means end of file.
        last: Option<u64>,
    },
    /// `bytes=-n`: the final `n` bytes.
    Suffix {
        /// Number of trailing bytes.
        len: u64,
    },
    /// `bytes=-a-b`: a negative first byte, never satisfiable.
    NegativeStart,
}

impl RangeRequest {
    /// Parse a `Range` header value. Anything that is not a single
    /// `bytes=` range is treated as absent.
    #[must_use]
    pub fn parse(header: Option<&str>) -> Self {
        let Some(spec) = header.and_then(|value| value.trim().strip_prefix("bytes=")) else {
            return Self::Full;
        };
        if spec.contains(',') {
            return Self::Full;
        }
        let Some((first, last)) = spec.split_once('-') else {
            return Self::Full;
        };
        let (first, last) = (first.trim(), last.trim());
        if first.is_empty() {
            if last.is_empty() {
                return Self::Full;
            }
            return last
                .parse()
                .map_or(Self::NegativeStart, |len| Self::Suffix { len });
        }
        let Ok(first) = first.parse() else {
            return Self::Full;
        };
        if last.is_empty() {
            return Self::Span { first, last: None };
        }
        last.parse()
            .map_or(Self::Full, |last| Self::Span {
                first,
                last: Some(last),
            })
    }

    /// Resolve against `file_size` into inclusive `(first, last)` bounds, or
    /// `None` for a whole-file response. Empty files have no bounds.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Unsatisfiable`] when `first > last`, the range
    /// ends past the file, the first byte is negative, or a suffix asks for
    /// zero bytes.
    pub fn resolve(self, file_size: u64) -> Result<Option<(u64, u64)>, PlanError> {
        let unsatisfiable = PlanError::Unsatisfiable { file_size };
        match self {
            Self::Full => Ok(None),
            Self::NegativeStart => Err(unsatisfiable),
            Self::Span { first, last } => {
                let last = match last {
                    Some(last) => last,
                    None => file_size.checked_sub(1).ok_or(unsatisfiable.clone())?,
                };
                if first > last || last >= file_size {
                    return Err(unsatisfiable);
                }
                Ok(Some((first, last)))
            }
            Self::Suffix { len } => {
                if len == 0 || file_size == 0 {
                    return Err(unsatisfiable);
                }
                Ok(Some((file_size.saturating_sub(len), file_size - 1)))
            }
        }
    }
}

/// Fully resolved description of what a stream session will send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    /// Torrent being served.
    pub torrent: InfoHash,
    /// Index of the file within the torrent.
    pub file_index: usize,
    /// Path of the file within the torrent.
    pub file_path: String,
    /// Size of the file.
    pub file_size: u64,
    /// Whether the response is a partial (206) one.
    pub partial: bool,
    /// First byte within the file, inclusive.
    pub first_byte: u64,
    /// Number of bytes to send.
    pub length: u64,
    /// Piece length of the torrent.
    pub piece_length: u32,
    /// First piece touched.
    pub first_piece: PieceIndex,
    /// One past the last piece touched.
    pub end_piece: PieceIndex,
    /// Offset of the first byte inside `first_piece`.
    pub first_offset: u32,
}

impl StreamPlan {
    /// Map a request on file `file_index` of `layout` onto pieces.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::FileIndexOutOfRange`] for bad indices and
    /// [`PlanError::Unsatisfiable`] for ranges outside the file.
    pub fn resolve(
        torrent: InfoHash,
        layout: &TorrentLayout,
        file_index: usize,
        request: RangeRequest,
    ) -> Result<Self, PlanError> {
        let file = layout
            .file(file_index)
            .ok_or(PlanError::FileIndexOutOfRange {
                index: file_index,
                files: layout.files.len(),
            })?;
        let bounds = request.resolve(file.size)?;
        let partial = bounds.is_some();
        let (first_byte, length) = match bounds {
            Some((first, last)) => (first, last - first + 1),
            None => (0, file.size),
        };

        let piece_length = u64::from(layout.piece_length);
        let start = file.offset + first_byte;
        let (first_piece, end_piece) = if length == 0 {
            let piece = start / piece_length;
            (piece, piece)
        } else {
            (start / piece_length, (start + length - 1) / piece_length + 1)
        };
        let unsatisfiable = || PlanError::Unsatisfiable {
            file_size: file.size,
        };

        Ok(Self {
            torrent,
            file_index,
            file_path: file.path.clone(),
            file_size: file.size,
            partial,
            first_byte,
            length,
            piece_length: layout.piece_length,
            first_piece: PieceIndex::try_from(first_piece).map_err(|_| unsatisfiable())?,
            end_piece: PieceIndex::try_from(end_piece).map_err(|_| unsatisfiable())?,
            first_offset: u32::try_from(start % piece_length).map_err(|_| unsatisfiable())?,
        })
    }

    /// Last byte within the file, inclusive. Meaningless for empty plans.
    #[must_use]
    pub const fn last_byte(&self) -> u64 {
        (self.first_byte + self.length).saturating_sub(1)
    }

    /// `Content-Range` value for a partial response.
    #[must_use]
    pub fn content_range(&self) -> String {
        format!(
            "bytes {}-{}/{}",
            self.first_byte,
            self.last_byte(),
            self.file_size
        )
    }

    /// Number of pieces touched.
    #[must_use]
    pub const fn piece_count(&self) -> u32 {
        self.end_piece - self.first_piece
    }
}

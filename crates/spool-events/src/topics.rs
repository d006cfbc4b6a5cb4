//! Event kinds and the raw integer tags observers subscribe with.

/// Closed set of routable event kinds.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// [`crate::Event::PieceRead`].
    PieceRead = 0,
    /// [`crate::Event::PieceFinished`].
    PieceFinished = 1,
    /// [`crate::Event::TorrentAdded`].
    TorrentAdded = 2,
    /// [`crate::Event::TorrentRemoved`].
    TorrentRemoved = 3,
    /// [`crate::Event::TorrentPaused`].
    TorrentPaused = 4,
    /// [`crate::Event::TorrentResumed`].
    TorrentResumed = 5,
    /// [`crate::Event::TorrentError`].
    TorrentError = 6,
    /// [`crate::Event::FileError`].
    FileError = 7,
    /// [`crate::Event::HashFailed`].
    HashFailed = 8,
}

impl EventKind {
    /// Number of kinds in the table.
    pub const COUNT: usize = 9;

    /// Every kind, ordered by tag.
    pub const ALL: [Self; Self::COUNT] = [
        Self::PieceRead,
        Self::PieceFinished,
        Self::TorrentAdded,
        Self::TorrentRemoved,
        Self::TorrentPaused,
        Self::TorrentResumed,
        Self::TorrentError,
        Self::FileError,
        Self::HashFailed,
    ];

    /// Stable integer tag of this kind.
    #[must_use]
    pub const fn tag(self) -> EventTag {
        EventTag(self as u8)
    }

    /// Resolve a raw tag back into a kind; `None` for tags outside the table.
    #[must_use]
    pub const fn from_tag(tag: EventTag) -> Option<Self> {
        let raw = tag.0 as usize;
        if raw < Self::COUNT {
            Some(Self::ALL[raw])
        } else {
            None
        }
    }

    /// Machine-friendly name used in logs and metric labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PieceRead => "piece_read",
            Self::PieceFinished => "piece_finished",
            Self::TorrentAdded => "torrent_added",
            Self::TorrentRemoved => "torrent_removed",
            Self::TorrentPaused => "torrent_paused",
            Self::TorrentResumed => "torrent_resumed",
            Self::TorrentError => "torrent_error",
            Self::FileError => "file_error",
            Self::HashFailed => "hash_failed",
        }
    }

    pub(crate) const fn slot(self) -> usize {
        self as usize
    }
}

/// Raw subscription tag. May name a kind outside the table; the bus ignores
/// those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventTag(pub u8);

impl From<EventKind> for EventTag {
    fn from(kind: EventKind) -> Self {
        kind.tag()
    }
}

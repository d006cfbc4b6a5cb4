//! Sliding prefetch window over the pieces of one range.

use spool_torrent_core::PieceIndex;

/// Sliding prefetch window over piece indices.
///
/// Keeps `begin <= end <= finish` and `end - begin <= max_in_flight`;
/// `finish` never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamWindow {
    begin: PieceIndex,
    end: PieceIndex,
    finish: PieceIndex,
}

impl StreamWindow {
    /// Open a window at `first`, admitting up to `max_in_flight` pieces
    /// (at least one) without passing `finish`.
    #[must_use]
    pub fn new(first: PieceIndex, finish: PieceIndex, max_in_flight: u32) -> Self {
        let finish = finish.max(first);
        Self {
            begin: first,
            end: first.saturating_add(max_in_flight.max(1)).min(finish),
            finish,
        }
    }

    /// First piece not yet consumed.
    #[must_use]
    pub const fn begin(&self) -> PieceIndex {
        self.begin
    }

    /// One past the last admitted piece.
    #[must_use]
    pub const fn end(&self) -> PieceIndex {
        self.end
    }

    /// One past the last piece of the range.
    #[must_use]
    pub const fn finish(&self) -> PieceIndex {
        self.finish
    }

    /// Whether `piece` is admitted and not yet consumed.
    #[must_use]
    pub const fn contains(&self, piece: PieceIndex) -> bool {
        self.begin <= piece && piece < self.end
    }

    /// Whether every piece has been consumed.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.begin == self.finish
    }

    /// Consume `begin` and slide forward by one. Returns the newly admitted
    /// piece, if the right edge moved.
    pub fn advance(&mut self) -> Option<PieceIndex> {
        let admitted = (self.end < self.finish).then_some(self.end);
        self.end = self.end.saturating_add(1).min(self.finish);
        self.begin = self.begin.saturating_add(1).min(self.end);
        admitted
    }
}

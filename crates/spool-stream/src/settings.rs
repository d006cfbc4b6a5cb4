//! Streaming tunables and the look-ahead they imply.

use std::time::Duration;

use spool_torrent_core::PiecePriority;

/// Tunables of the streaming pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Bytes of look-ahead a session keeps requested.
    pub prefetch_budget_bytes: u64,
    /// Priority given to every piece of an active range.
    pub elevated_priority: PiecePriority,
    /// Deadline spacing between consecutive pieces.
    pub deadline_step: Duration,
    /// How long one wait for the next piece lasts before re-arming.
    pub piece_wait_slice: Duration,
    /// How long a single piece may be missing before the session fails.
    pub piece_stall_timeout: Duration,
    /// Timeout of each broker fetch.
    pub fetch_timeout: Duration,
    /// Pause between attempts to write into a full sink.
    pub write_retry_backoff: Duration,
    /// How long the sink may stay full before the session fails.
    pub write_stall_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            prefetch_budget_bytes: 20 * 1024 * 1024,
            elevated_priority: PiecePriority::ELEVATED,
            deadline_step: Duration::from_millis(100),
            piece_wait_slice: Duration::from_millis(500),
            piece_stall_timeout: Duration::from_secs(120),
            fetch_timeout: Duration::from_secs(60),
            write_retry_backoff: Duration::from_millis(100),
            write_stall_timeout: Duration::from_secs(30),
        }
    }
}

impl StreamSettings {
    /// Pieces admitted to a window at once for `piece_length`; at least one.
    #[must_use]
    pub fn max_in_flight(&self, piece_length: u32) -> u32 {
        let pieces = self.prefetch_budget_bytes / u64::from(piece_length.max(1));
        u32::try_from(pieces).unwrap_or(u32::MAX).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_in_flight_is_at_least_one() {
        let settings = StreamSettings::default();
        assert_eq!(settings.max_in_flight(16_384), 1_280);
        assert_eq!(settings.max_in_flight(64 * 1024 * 1024), 1);
        let tiny = StreamSettings {
            prefetch_budget_bytes: 0,
            ..StreamSettings::default()
        };
        assert_eq!(tiny.max_in_flight(16_384), 1);
    }
}

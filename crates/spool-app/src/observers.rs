//! Bus observers owned by the application: engine failure logging and
//! dispatch counting.

use std::sync::atomic::{AtomicU64, Ordering};

use spool_events::{Event, EventKind, EventObserver, EventTag};
use spool_telemetry::Metrics;
use tracing::{error, warn};

/// Logs torrent, file and hash failures reported by the engine.
#[derive(Debug, Default)]
pub struct EngineErrorLogger {
    logged: AtomicU64,
}

impl EngineErrorLogger {
    /// Kinds the logger subscribes to.
    pub const TAGS: [EventTag; 3] = [
        EventKind::TorrentError.tag(),
        EventKind::FileError.tag(),
        EventKind::HashFailed.tag(),
    ];

    /// Failures logged so far.
    #[must_use]
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

impl EventObserver for EngineErrorLogger {
    fn handle_event(&self, event: &Event) {
        match event {
            Event::TorrentError { torrent, message } => {
                error!(%torrent, %message, "torrent error");
            }
            Event::FileError {
                torrent,
                path,
                message,
            } => {
                error!(%torrent, file = %path, %message, "file error");
            }
            Event::HashFailed { torrent, piece } => {
                warn!(%torrent, piece, "piece failed hash check");
            }
            _ => return,
        }
        self.logged.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts every dispatched event by kind.
pub struct DispatchCounter {
    telemetry: Metrics,
}

impl DispatchCounter {
    /// Every kind in the table.
    pub const TAGS: [EventTag; EventKind::COUNT] = {
        let mut tags = [EventTag(0); EventKind::COUNT];
        let mut index = 0;
        while index < EventKind::COUNT {
            tags[index] = EventKind::ALL[index].tag();
            index += 1;
        }
        tags
    };

    /// Count into `telemetry`.
    #[must_use]
    pub const fn new(telemetry: Metrics) -> Self {
        Self { telemetry }
    }
}

impl EventObserver for DispatchCounter {
    fn handle_event(&self, event: &Event) {
        self.telemetry.inc_event(event.kind().name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_events::InfoHash;

    fn torrent() -> InfoHash {
        InfoHash::new([7; InfoHash::LEN])
    }

    #[test]
    fn logger_counts_only_failures() {
        let logger = EngineErrorLogger::default();
        let events = [
            Event::TorrentError {
                torrent: torrent(),
                message: "tracker unreachable".into(),
            },
            Event::FileError {
                torrent: torrent(),
                path: "show/ep1.mkv".into(),
                message: "disk full".into(),
            },
            Event::HashFailed {
                torrent: torrent(),
                piece: 4,
            },
            Event::TorrentPaused { torrent: torrent() },
        ];
        for event in &events {
            logger.handle_event(event);
        }
        assert_eq!(logger.logged(), 3);
    }

    #[test]
    fn counter_covers_every_kind() -> anyhow::Result<()> {
        assert_eq!(DispatchCounter::TAGS.len(), EventKind::COUNT);
        for (tag, kind) in DispatchCounter::TAGS.iter().zip(EventKind::ALL) {
            assert_eq!(EventKind::from_tag(*tag), Some(kind));
        }

        let metrics = Metrics::new()?;
        let counter = DispatchCounter::new(metrics.clone());
        counter.handle_event(&Event::TorrentResumed { torrent: torrent() });
        counter.handle_event(&Event::TorrentResumed { torrent: torrent() });
        let rendered = metrics.render()?;
        assert!(rendered.contains("events_dispatched_total{kind=\"torrent_resumed\"} 2"));
        Ok(())
    }
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use spool_engine::{EngineSession, EventPump, MemorySession};
use spool_events::{EventBus, SubscriptionFlags};
use spool_stream::{PieceBroker, RangeStreamer, StreamSettings};
use spool_torrent_core::{PieceEngine, SessionTicker};

pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Streaming settings scaled down for tests: four pieces of look-ahead at
/// the fixture piece length and short timers.
pub fn fast_settings() -> StreamSettings {
    StreamSettings {
        prefetch_budget_bytes: 4 * u64::from(spool_test_support::fixtures::PIECE_LENGTH),
        deadline_step: Duration::from_millis(10),
        piece_wait_slice: Duration::from_millis(20),
        piece_stall_timeout: Duration::from_secs(2),
        fetch_timeout: Duration::from_secs(1),
        write_retry_backoff: Duration::from_millis(5),
        write_stall_timeout: Duration::from_millis(200),
        ..StreamSettings::default()
    }
}

/// Memory session, bus, broker, pump and controller wired the way the
/// binary wires them.
pub struct Harness {
    pub session: Arc<MemorySession>,
    pub bus: EventBus,
    pub broker: Arc<PieceBroker>,
    pub streamer: Arc<RangeStreamer>,
    pump: EventPump,
}

impl Harness {
    pub fn start(settings: StreamSettings) -> Self {
        let session = Arc::new(MemorySession::new());
        let engine: Arc<dyn PieceEngine> = session.clone();
        let bus = EventBus::new();
        let broker = Arc::new(PieceBroker::new(Arc::clone(&engine)));
        bus.subscribe(&broker, &PieceBroker::TAGS, SubscriptionFlags::NONE);
        let streamer = Arc::new(RangeStreamer::new(
            engine,
            bus.clone(),
            Arc::clone(&broker),
            settings,
        ));
        let pumped: Arc<dyn EngineSession> = session.clone();
        let ticker: Arc<dyn SessionTicker> = broker.clone();
        let pump = EventPump::spawn(bus.clone(), pumped, vec![ticker], POLL_INTERVAL);
        Self {
            session,
            bus,
            broker,
            streamer,
            pump,
        }
    }

    /// Sleep until `count` sessions are live.
    pub async fn wait_for_sessions(&self, count: usize) {
        while self.streamer.active_sessions() != count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub async fn shutdown(self) {
        self.pump.shutdown().await;
    }
}

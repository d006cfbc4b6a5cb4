use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use spool_events::EventBus;
use spool_torrent_core::SessionTicker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::session::EngineSession;

/// Background task that drains the engine session into the bus.
///
/// Every interval it polls the session, dispatches the batch and ticks the
/// registered tickers. On shutdown it drains once more and aborts the bus so
/// every pending one-shot wait resolves.
pub struct EventPump {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl EventPump {
    /// Start pumping on the current runtime.
    #[must_use]
    pub fn spawn(
        bus: EventBus,
        session: Arc<dyn EngineSession>,
        tickers: Vec<Arc<dyn SessionTicker>>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut worker = Worker::new(bus, session, tickers);
            let mut poll = tokio::time::interval(poll_interval);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = poll.tick() => worker.pump(),
                }
            }
            worker.pump();
            worker.bus.abort();
            info!(dispatched = worker.dispatched, "event pump stopped");
        });
        Self { shutdown, task }
    }

    /// Stop the pump and wait for its final drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "event pump task failed");
        }
    }
}

struct Worker {
    bus: EventBus,
    session: Arc<dyn EngineSession>,
    tickers: Vec<Arc<dyn SessionTicker>>,
    health: BTreeSet<&'static str>,
    dispatched: u64,
}

impl Worker {
    fn new(
        bus: EventBus,
        session: Arc<dyn EngineSession>,
        tickers: Vec<Arc<dyn SessionTicker>>,
    ) -> Self {
        Self {
            bus,
            session,
            tickers,
            health: BTreeSet::new(),
            dispatched: 0,
        }
    }

    fn pump(&mut self) {
        match self.session.poll_events() {
            Ok(events) => {
                self.mark_recovered("session");
                if !events.is_empty() {
                    let count = events.len();
                    let invocations = self.bus.dispatch(events);
                    self.dispatched += count as u64;
                    debug!(events = count, invocations, "dispatched engine events");
                }
            }
            Err(err) => {
                let detail = err.to_string();
                self.mark_degraded("session", Some(&detail));
            }
        }

        let now = Instant::now();
        for ticker in &self.tickers {
            ticker.on_tick(now);
        }
    }

    fn mark_degraded(&mut self, component: &'static str, detail: Option<&str>) {
        let inserted = self.health.insert(component);
        match (inserted, detail) {
            (true, Some(detail)) => {
                warn!(component, detail = %detail, "engine component degraded");
            }
            (true, None) => warn!(component, "engine component degraded"),
            (false, Some(detail)) => {
                warn!(component, detail = %detail, "engine component still degraded");
            }
            (false, None) => {}
        }
    }

    fn mark_recovered(&mut self, component: &'static str) {
        if self.health.remove(component) {
            info!(component, "engine component recovered");
        }
    }
}

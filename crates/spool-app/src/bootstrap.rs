use std::future::Future;
use std::sync::Arc;

use spool_api::ApiServer;
use spool_config::AppConfig;
use spool_engine::{Availability, EngineSession, EventPump, MemorySession, load_path};
use spool_events::{EventBus, SubscriptionFlags};
use spool_stream::{PieceBroker, RangeStreamer};
use spool_telemetry::{GlobalContextGuard, LoggingConfig, Metrics};
use spool_torrent_core::{InfoHash, PieceEngine, SessionTicker};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::observers::{DispatchCounter, EngineErrorLogger};

/// Running engine-side services: session, bus, broker, pump and streamer.
///
/// Observers stay subscribed for as long as this value lives.
pub struct Services {
    /// Engine session.
    pub session: Arc<MemorySession>,
    /// Event bus fed by the pump.
    pub events: EventBus,
    /// Range streaming controller.
    pub streamer: Arc<RangeStreamer>,
    /// Shared metrics registry.
    pub telemetry: Metrics,
    /// Engine failure logger.
    pub error_logger: Arc<EngineErrorLogger>,
    /// Torrent loaded from the seed path, if any.
    pub seeded: Option<InfoHash>,
    _dispatch_counter: Arc<DispatchCounter>,
    pump: EventPump,
}

impl Services {
    /// Wire the engine session, bus observers, broker, pump and streamer.
    /// Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured seed path cannot be loaded.
    pub fn start(config: &AppConfig, telemetry: Metrics) -> AppResult<Self> {
        let session = Arc::new(MemorySession::new());
        let seeded = match &config.engine.seed_dir {
            Some(path) => {
                let torrent = load_path(path, config.engine.seed_piece_length).map_err(
                    |source| AppError::Seed {
                        path: path.clone(),
                        source,
                    },
                )?;
                let info_hash = torrent.info_hash;
                info!(
                    torrent = %info_hash,
                    name = %torrent.layout.name,
                    files = torrent.layout.files.len(),
                    bytes = torrent.layout.total_size,
                    "seeding loopback torrent"
                );
                session.add_torrent(torrent, Availability::Complete);
                Some(info_hash)
            }
            None => {
                warn!("no seed path configured; serving an empty session");
                None
            }
        };

        let events = EventBus::new();
        let engine: Arc<dyn PieceEngine> = session.clone();
        let broker = Arc::new(PieceBroker::new(Arc::clone(&engine)));
        events.subscribe(&broker, &PieceBroker::TAGS, SubscriptionFlags::NONE);

        let error_logger = Arc::new(EngineErrorLogger::default());
        events.subscribe(
            &error_logger,
            &EngineErrorLogger::TAGS,
            SubscriptionFlags::NONE,
        );
        let dispatch_counter = Arc::new(DispatchCounter::new(telemetry.clone()));
        events.subscribe(
            &dispatch_counter,
            &DispatchCounter::TAGS,
            SubscriptionFlags::NONE,
        );

        let streamer = Arc::new(RangeStreamer::new(
            engine,
            events.clone(),
            Arc::clone(&broker),
            config.streaming.stream_settings(),
        ));
        let pumped: Arc<dyn EngineSession> = session.clone();
        let ticker: Arc<dyn SessionTicker> = broker;
        let pump = EventPump::spawn(
            events.clone(),
            pumped,
            vec![ticker],
            config.engine.poll_interval(),
        );

        Ok(Self {
            session,
            events,
            streamer,
            telemetry,
            error_logger,
            seeded,
            _dispatch_counter: dispatch_counter,
            pump,
        })
    }

    /// Stop the pump; pending waiters resolve empty.
    pub async fn shutdown(self) {
        self.pump.shutdown().await;
    }
}

/// Entry point for the Spool boot sequence: configuration, logging, then
/// [`run_app_with`] until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration, logging, seeding or serving fails.
pub async fn run_app() -> AppResult<()> {
    let config =
        spool_config::load_from_env().map_err(|err| AppError::config("config.load", err))?;
    let logging = LoggingConfig {
        level: &config.logging.level,
        format: config.logging.format,
        ..LoggingConfig::default()
    };
    spool_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("spool");

    info!("spool bootstrap starting");
    run_app_with(config, shutdown_signal()).await
}

/// Boot sequence over an already loaded configuration; serves until
/// `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if seeding, binding or serving fails.
pub async fn run_app_with<F>(config: AppConfig, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let telemetry =
        Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let listener = ApiServer::bind(config.server.bind_addr)
        .await
        .map_err(|err| AppError::api_server("api.bind", err))?;
    let services = Services::start(&config, telemetry)?;
    serve(&config, services, listener, shutdown).await
}

/// Serve the API for `services` on `listener`, then stop the pump.
///
/// # Errors
///
/// Returns an error if the server terminates unexpectedly.
pub async fn serve<F>(
    config: &AppConfig,
    services: Services,
    listener: TcpListener,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let api = ApiServer::new(
        Arc::clone(&services.streamer),
        config,
        services.telemetry.clone(),
    );
    let served = api
        .serve(listener, shutdown)
        .await
        .map_err(|err| AppError::api_server("api.serve", err));
    info!("api stopped; draining engine events");
    services.shutdown().await;
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

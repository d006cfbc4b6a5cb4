use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use spool_api::ApiServer;
use spool_config::{AccessConfig, Account, AppConfig, PermissionSet};
use spool_engine::{Availability, EngineSession, EventPump, MemorySession, MemoryTorrent};
use spool_events::{EventBus, SubscriptionFlags};
use spool_stream::{PieceBroker, RangeStreamer};
use spool_telemetry::Metrics;
use spool_test_support::credentials::argon2_hash;
use spool_test_support::fixtures::{self, PIECE_LENGTH};
use spool_torrent_core::{PieceEngine, SessionTicker};
use tower::ServiceExt;

struct Server {
    session: Arc<MemorySession>,
    metrics: Metrics,
    router: Router,
    pump: EventPump,
}

impl Server {
    fn start(mut config: AppConfig) -> Result<Self> {
        config.streaming.prefetch_budget_bytes = 4 * u64::from(PIECE_LENGTH);
        config.streaming.deadline_step_ms = 10;
        config.streaming.piece_wait_ms = 20;
        config.streaming.piece_stall_secs = 1;
        config.streaming.write_backoff_ms = 5;
        spool_config::validate(&config)?;

        let session = Arc::new(MemorySession::new());
        let engine: Arc<dyn PieceEngine> = session.clone();
        let bus = EventBus::new();
        let broker = Arc::new(PieceBroker::new(Arc::clone(&engine)));
        bus.subscribe(&broker, &PieceBroker::TAGS, SubscriptionFlags::NONE);
        let streamer = Arc::new(RangeStreamer::new(
            engine,
            bus.clone(),
            Arc::clone(&broker),
            config.streaming.stream_settings(),
        ));
        let pumped: Arc<dyn EngineSession> = session.clone();
        let ticker: Arc<dyn SessionTicker> = broker;
        let pump = EventPump::spawn(bus, pumped, vec![ticker], Duration::from_millis(5));

        let metrics = Metrics::new()?;
        let router = ApiServer::new(streamer, &config, metrics.clone()).into_router();
        Ok(Self {
            session,
            metrics,
            router,
            pump,
        })
    }

    fn seed(&self, torrent: &MemoryTorrent) {
        self.session
            .add_torrent(torrent.clone(), Availability::Complete);
    }

    async fn get(&self, uri: &str, headers: &[(header::HeaderName, &str)]) -> Result<Reply> {
        let mut request = Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(name, *value);
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty())?)
            .await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await;
        Ok(Reply {
            status,
            headers,
            body: body.map(|bytes| bytes.to_vec()).map_err(|err| err.to_string()),
        })
    }

    async fn shutdown(self) {
        self.pump.shutdown().await;
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Result<Vec<u8>, String>,
}

impl Reply {
    fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn bytes(&self) -> Result<&[u8]> {
        self.body
            .as_deref()
            .map_err(|err| anyhow::anyhow!("body failed: {err}"))
    }

    fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(self.bytes()?)?)
    }
}

fn download_uri(torrent: &MemoryTorrent, file: usize) -> String {
    format!("/download?ih={}&file={file}", torrent.info_hash)
}

#[tokio::test]
async fn range_request_returns_partial_content() -> Result<()> {
    let server = Server::start(AppConfig::default())?;
    let torrent = fixtures::single_file(1, PIECE_LENGTH, 100_000)?;
    server.seed(&torrent);

    let reply = server
        .get(
            &download_uri(&torrent, 0),
            &[(header::RANGE, "bytes=20000-39999")],
        )
        .await?;
    assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        reply.header(header::CONTENT_RANGE),
        Some("bytes 20000-39999/100000")
    );
    assert_eq!(reply.header(header::CONTENT_LENGTH), Some("20000"));
    assert_eq!(reply.header(header::ACCEPT_RANGES), Some("bytes"));
    assert_eq!(
        reply.header(header::CONTENT_TYPE),
        Some("application/octet-stream")
    );
    assert!(
        reply
            .header(header::CONTENT_DISPOSITION)
            .is_some_and(|value| value.starts_with("attachment; filename="))
    );
    assert_eq!(
        reply.bytes()?,
        &fixtures::file_slice(&torrent, 0, 20_000, 20_000)[..]
    );
    assert!(reply.headers.contains_key("x-request-id"));
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn whole_file_is_served_with_ok() -> Result<()> {
    let mut config = AppConfig::default();
    config.server.attachment = false;
    let server = Server::start(config)?;
    let torrent = fixtures::multi_file(
        2,
        PIECE_LENGTH,
        &[("show/ep1.mkv", 50_000), ("show/ep1.srt", 900)],
    )?;
    server.seed(&torrent);

    let reply = server
        .get(&format!("/proxy?sid={}&file=1", torrent.info_hash), &[])
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header(header::CONTENT_RANGE), None);
    assert_eq!(reply.header(header::CONTENT_DISPOSITION), None);
    assert_eq!(reply.header(header::CONTENT_LENGTH), Some("900"));
    assert_eq!(
        reply.header(header::CONTENT_TYPE),
        Some("application/x-subrip")
    );
    assert_eq!(reply.bytes()?, &fixtures::file_slice(&torrent, 1, 0, 900)[..]);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn bad_requests_are_problem_documents() -> Result<()> {
    let server = Server::start(AppConfig::default())?;
    let torrent = fixtures::single_file(3, PIECE_LENGTH, 100_000)?;
    server.seed(&torrent);
    let unknown = fixtures::info_hash(77);

    let cases = [
        (
            download_uri(&torrent, 0),
            Some("bytes=99999-100005"),
            StatusCode::RANGE_NOT_SATISFIABLE,
        ),
        (
            download_uri(&torrent, 0),
            Some("bytes=-5-10"),
            StatusCode::RANGE_NOT_SATISFIABLE,
        ),
        (download_uri(&torrent, 5), None, StatusCode::BAD_REQUEST),
        (
            format!("/download?ih={unknown}&file=0"),
            None,
            StatusCode::NOT_FOUND,
        ),
        ("/download?file=0".to_string(), None, StatusCode::BAD_REQUEST),
        (
            "/download?ih=xyz&file=0".to_string(),
            None,
            StatusCode::BAD_REQUEST,
        ),
        (
            format!("/download?ih={}", torrent.info_hash),
            None,
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (uri, range, status) in cases {
        let headers: Vec<_> = range.map(|value| (header::RANGE, value)).into_iter().collect();
        let reply = server.get(&uri, &headers).await?;
        assert_eq!(reply.status, status, "{uri}");
        assert_eq!(
            reply.header(header::CONTENT_TYPE),
            Some("application/problem+json"),
            "{uri}"
        );
        assert_eq!(reply.json()?["status"], status.as_u16(), "{uri}");
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            assert_eq!(reply.header(header::CONTENT_RANGE), Some("bytes */100000"));
        }
    }
    server.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stalled_piece_fails_the_body_and_is_counted() -> Result<()> {
    let server = Server::start(AppConfig::default())?;
    let torrent = fixtures::single_file(4, PIECE_LENGTH, 4 * u64::from(PIECE_LENGTH))?;
    server.seed(&torrent);
    server.session.withhold_piece(torrent.info_hash, 2)?;

    let reply = server.get(&download_uri(&torrent, 0), &[]).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_err());

    let rendered = server.metrics.render()?;
    assert!(rendered.contains("stream_sessions_total{outcome=\"piece_stalled\"} 1"));
    assert_eq!(server.metrics.snapshot().active_streams, 0);
    assert_eq!(
        server.metrics.snapshot().stream_bytes_total,
        2 * u64::from(PIECE_LENGTH)
    );
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn basic_access_enforces_credentials_and_permissions() -> Result<()> {
    let mut config = AppConfig::default();
    config.access = AccessConfig::Basic {
        accounts: vec![
            Account {
                username: "admin".into(),
                password_hash: argon2_hash("admin-pass")?,
                permissions: PermissionSet::FULL,
            },
            Account {
                username: "guest".into(),
                password_hash: argon2_hash("guest-pass")?,
                permissions: PermissionSet::READ_ONLY,
            },
        ],
    };
    let server = Server::start(config)?;
    let torrent = fixtures::single_file(5, PIECE_LENGTH, 1_000)?;
    server.seed(&torrent);
    let basic = |user: &str, pass: &str| format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")));
    let (admin, guest, wrong) = (
        basic("admin", "admin-pass"),
        basic("guest", "guest-pass"),
        basic("guest", "admin-pass"),
    );
    let uri = download_uri(&torrent, 0);

    let cases = [
        (uri.as_str(), None, StatusCode::UNAUTHORIZED),
        (uri.as_str(), Some(wrong.as_str()), StatusCode::UNAUTHORIZED),
        (uri.as_str(), Some(guest.as_str()), StatusCode::OK),
        ("/debug/requests", Some(guest.as_str()), StatusCode::FORBIDDEN),
        ("/debug/requests", Some(admin.as_str()), StatusCode::OK),
        ("/health", None, StatusCode::OK),
    ];
    for (uri, authorization, status) in cases {
        let headers: Vec<_> = authorization
            .map(|value| (header::AUTHORIZATION, value))
            .into_iter()
            .collect();
        let reply = server.get(uri, &headers).await?;
        assert_eq!(reply.status, status, "{uri} {authorization:?}");
        if status == StatusCode::UNAUTHORIZED {
            assert_eq!(
                reply.header(header::WWW_AUTHENTICATE),
                Some("Basic realm=\"spool\"")
            );
        }
        if status == StatusCode::OK && uri.starts_with("/download") {
            assert_eq!(reply.bytes()?, &fixtures::file_slice(&torrent, 0, 0, 1_000)[..]);
        }
        if uri == "/debug/requests" && status == StatusCode::OK {
            assert!(reply.json()?["requests"].is_array());
        }
    }
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn health_and_metrics_report_activity() -> Result<()> {
    let server = Server::start(AppConfig::default())?;
    let torrent = fixtures::single_file(6, PIECE_LENGTH, 30_000)?;
    server.seed(&torrent);

    let reply = server.get(&download_uri(&torrent, 0), &[]).await?;
    assert_eq!(reply.bytes()?.len(), 30_000);

    let health = server.get("/health", &[]).await?;
    assert_eq!(health.status, StatusCode::OK);
    let body = health.json()?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);

    let metrics = server.get("/metrics", &[]).await?;
    assert_eq!(
        metrics.header(header::CONTENT_TYPE),
        Some("text/plain; version=0.0.4")
    );
    let text = String::from_utf8(metrics.bytes()?.to_vec())?;
    assert!(text.contains("http_requests_total{code=\"200\",route=\"/download\"} 1"));
    assert!(text.contains("http_requests_total{code=\"200\",route=\"/health\"} 1"));
    server.shutdown().await;
    Ok(())
}

use std::time::Duration;

use anyhow::Result;
use spool_app::{AppError, Services, serve};
use spool_config::AppConfig;
use spool_events::Event;
use spool_stream::MemorySink;
use spool_telemetry::Metrics;
use spool_test_support::fixtures;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

fn seeded_config(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.engine.seed_dir = Some(dir.to_path_buf());
    config.engine.poll_interval_ms = 5;
    config
}

#[tokio::test]
async fn seed_directory_is_served_from_the_session() -> Result<()> {
    let dir = fixtures::seed_dir(&[("a.bin", 40_000), ("b/c.txt", 100)])?;
    let services = Services::start(&seeded_config(dir.path()), Metrics::new()?)?;
    let torrent = services
        .seeded
        .ok_or_else(|| anyhow::anyhow!("seed torrent missing"))?;

    let plan = services.streamer.plan(torrent, 0, Some("bytes=1000-"))?;
    let mut sink = MemorySink::new();
    let outcome = services.streamer.stream(&plan, &mut sink).await;
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.bytes_sent, 39_000);
    assert_eq!(sink.data(), &fixtures::patterned(40_000, 0)[1_000..]);

    let plan = services.streamer.plan(torrent, 1, None)?;
    let mut sink = MemorySink::new();
    let outcome = services.streamer.stream(&plan, &mut sink).await;
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(sink.data(), &fixtures::patterned(100, 1)[..]);

    let rendered = services.telemetry.render()?;
    assert!(rendered.contains("events_dispatched_total{kind=\"torrent_added\"} 1"));
    services.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn engine_failures_reach_the_error_logger() -> Result<()> {
    let services = Services::start(&AppConfig::default(), Metrics::new()?)?;
    assert_eq!(services.seeded, None);
    services.session.inject(Event::FileError {
        torrent: fixtures::info_hash(9),
        path: "movie/part1.mkv".into(),
        message: "disk full".into(),
    });
    services.session.inject(Event::HashFailed {
        torrent: fixtures::info_hash(9),
        piece: 3,
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while services.error_logger.logged() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    services.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn missing_seed_path_fails_startup() -> Result<()> {
    let dir = fixtures::seed_dir(&[])?;
    let missing = dir.path().join("absent");
    let result = Services::start(&seeded_config(&missing), Metrics::new()?);
    assert!(matches!(result, Err(AppError::Seed { path, .. }) if path == missing));
    Ok(())
}

#[tokio::test]
async fn api_serves_until_shutdown() -> Result<()> {
    let dir = fixtures::seed_dir(&[("clip.mp4", 5_000)])?;
    let config = seeded_config(dir.path());
    let services = Services::start(&config, Metrics::new()?)?;
    let torrent = services
        .seeded
        .ok_or_else(|| anyhow::anyhow!("seed torrent missing"))?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        serve(&config, services, listener, async {
            let _ = stopped.await;
        })
        .await
    });

    let mut stream = TcpStream::connect(addr).await?;
    let request = format!(
        "GET /download?ih={torrent}&file=0 HTTP/1.1\r\nHost: localhost\r\nRange: bytes=0-9\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await?;
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    let head_end = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .ok_or_else(|| anyhow::anyhow!("no header terminator"))?;
    let head = String::from_utf8_lossy(&raw[..head_end]).to_ascii_lowercase();
    assert!(head.starts_with("http/1.1 206"), "{head}");
    assert!(head.contains("content-range: bytes 0-9/5000"), "{head}");
    assert!(head.contains("content-type: video/mp4"), "{head}");
    assert_eq!(&raw[head_end + 4..], &fixtures::patterned(5_000, 0)[..10]);

    let _ = stop.send(());
    tokio::time::timeout(Duration::from_secs(5), server).await???;
    Ok(())
}

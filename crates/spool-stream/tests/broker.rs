use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use spool_engine::{Availability, EngineSession, MemorySession};
use spool_events::{Event, EventBus, SubscriptionFlags};
use spool_stream::{CancelReason, FetchError, PieceBroker};
use spool_test_support::fixtures::{self, PIECE_LENGTH};
use spool_torrent_core::{PieceEngine, PieceKey, PiecePriority, SessionTicker};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(60);

struct Rig {
    session: Arc<MemorySession>,
    bus: EventBus,
    broker: Arc<PieceBroker>,
}

impl Rig {
    fn new() -> Self {
        let session = Arc::new(MemorySession::new());
        let engine: Arc<dyn PieceEngine> = session.clone();
        let bus = EventBus::new();
        let broker = Arc::new(PieceBroker::new(engine));
        bus.subscribe(&broker, &PieceBroker::TAGS, SubscriptionFlags::NONE);
        Self {
            session,
            bus,
            broker,
        }
    }

    fn pump(&self) -> Result<()> {
        self.bus.dispatch(self.session.poll_events()?);
        Ok(())
    }
}

#[tokio::test]
async fn concurrent_reads_of_one_piece_share_the_delivery() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(1, PIECE_LENGTH, 3 * u64::from(PIECE_LENGTH))?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent.clone(), Availability::Empty);

    let first = rig.broker.read_piece(id, 1, TIMEOUT);
    let second = rig.broker.read_piece(id, 1, TIMEOUT);
    assert_eq!(rig.broker.pending(), 2);
    assert_eq!(rig.session.piece_priority(id, 1)?, PiecePriority::TOP);

    rig.session.complete_piece(id, 1)?;
    rig.pump()?;
    assert!(rig.broker.knows_piece(id, 1));
    rig.pump()?;

    let expected = torrent.content.slice(16_384..32_768);
    let (first, second) = (first.await?, second.await?);
    assert_eq!(first.key, PieceKey::new(id, 1));
    assert_eq!(first.buffer, expected);
    assert_eq!(second.buffer, expected);
    assert_eq!(rig.broker.pending(), 0);
    assert_eq!(rig.session.read_count(id, 1), 1);
    Ok(())
}

#[tokio::test]
async fn present_pieces_are_read_right_away() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(2, PIECE_LENGTH, 40_000)?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent.clone(), Availability::Complete);

    let fetch = rig.broker.read_piece(id, 2, TIMEOUT);
    rig.pump()?;
    let data = fetch.await?;
    assert_eq!(data.buffer, torrent.content.slice(32_768..40_000));
    assert_eq!(rig.session.piece_priority(id, 2)?, PiecePriority::DEFAULT);
    Ok(())
}

#[tokio::test]
async fn sweep_expires_one_request_per_tick_and_wraps() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(3, PIECE_LENGTH, 4 * u64::from(PIECE_LENGTH))?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent, Availability::Empty);

    let keep = rig.broker.read_piece(id, 0, TIMEOUT);
    let expire_a = rig.broker.read_piece(id, 1, Duration::ZERO);
    let expire_b = rig.broker.read_piece(id, 2, Duration::ZERO);
    let later = Instant::now() + Duration::from_secs(1);

    let mut remaining = Vec::new();
    for _ in 0..4 {
        rig.broker.on_tick(later);
        remaining.push(rig.broker.pending());
    }
    assert_eq!(remaining, vec![3, 2, 1, 1]);

    assert_eq!(
        expire_a.await,
        Err(FetchError::TimedOut {
            key: PieceKey::new(id, 1)
        })
    );
    assert!(matches!(expire_b.await, Err(FetchError::TimedOut { .. })));

    rig.session.complete_piece(id, 0)?;
    rig.pump()?;
    rig.pump()?;
    assert!(keep.await.is_ok());
    Ok(())
}

#[tokio::test]
async fn timed_out_requests_never_see_late_data() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(4, PIECE_LENGTH, 2 * u64::from(PIECE_LENGTH))?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent, Availability::Empty);

    let fetch = rig.broker.read_piece(id, 0, Duration::ZERO);
    rig.broker.on_tick(Instant::now() + Duration::from_millis(1));
    rig.session.complete_piece(id, 0)?;
    rig.pump()?;
    rig.pump()?;
    assert!(matches!(fetch.await, Err(FetchError::TimedOut { .. })));
    assert_eq!(rig.session.read_count(id, 0), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fetch_timeouts_follow_the_runtime_clock() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(8, PIECE_LENGTH, u64::from(PIECE_LENGTH))?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent, Availability::Empty);

    let fetch = rig.broker.read_piece(id, 0, Duration::from_secs(5));
    rig.broker.on_tick(Instant::now());
    assert_eq!(rig.broker.pending(), 1);

    tokio::time::advance(Duration::from_secs(5)).await;
    rig.broker.on_tick(Instant::now());
    assert_eq!(rig.broker.pending(), 0);
    assert_eq!(
        fetch.await,
        Err(FetchError::TimedOut {
            key: PieceKey::new(id, 0)
        })
    );
    Ok(())
}

#[tokio::test]
async fn abandoned_requests_are_swept_early() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(5, PIECE_LENGTH, 1_000)?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent, Availability::Empty);

    drop(rig.broker.read_piece(id, 0, TIMEOUT));
    rig.broker.on_tick(Instant::now());
    assert_eq!(rig.broker.pending(), 0);
    Ok(())
}

#[tokio::test]
async fn removal_and_pause_cancel_pending_requests() -> Result<()> {
    let rig = Rig::new();
    let removed = fixtures::single_file(6, PIECE_LENGTH, 2 * u64::from(PIECE_LENGTH))?;
    let paused = fixtures::single_file(7, PIECE_LENGTH, 2 * u64::from(PIECE_LENGTH))?;
    let (removed_id, paused_id) = (removed.info_hash, paused.info_hash);
    rig.session.add_torrent(removed, Availability::Empty);
    rig.session.add_torrent(paused, Availability::Empty);
    rig.pump()?;

    let gone = [
        rig.broker.read_piece(removed_id, 0, TIMEOUT),
        rig.broker.read_piece(removed_id, 1, TIMEOUT),
    ];
    let held = rig.broker.read_piece(paused_id, 1, TIMEOUT);

    rig.session.remove_torrent(removed_id)?;
    rig.session.pause_torrent(paused_id)?;
    rig.pump()?;

    for (piece, fetch) in gone.into_iter().enumerate() {
        assert_eq!(
            fetch.await,
            Err(FetchError::Cancelled {
                key: PieceKey::new(removed_id, u32::try_from(piece)?),
                reason: CancelReason::TorrentRemoved,
            })
        );
    }
    assert!(matches!(
        held.await,
        Err(FetchError::Cancelled {
            reason: CancelReason::TorrentPaused,
            ..
        })
    ));
    assert_eq!(rig.broker.pending(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_reads_and_rejections_resolve_with_errors() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(8, PIECE_LENGTH, 1_000)?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent, Availability::Empty);

    let failing = rig.broker.read_piece(id, 0, TIMEOUT);
    rig.bus.dispatch([Event::PieceRead {
        torrent: id,
        piece: 0,
        buffer: Bytes::new(),
        error: Some("disk read failed".into()),
    }]);
    assert_eq!(
        failing.await,
        Err(FetchError::ReadFailed {
            key: PieceKey::new(id, 0),
            message: Some("disk read failed".into()),
        })
    );

    let unknown = fixtures::info_hash(200);
    let rejected = rig.broker.read_piece(unknown, 0, TIMEOUT);
    assert!(matches!(rejected.await, Err(FetchError::Rejected { .. })));
    assert_eq!(rig.broker.pending(), 0);
    Ok(())
}

#[tokio::test]
async fn dropping_the_broker_cancels_outstanding_fetches() -> Result<()> {
    let rig = Rig::new();
    let torrent = fixtures::single_file(9, PIECE_LENGTH, 1_000)?;
    let id = torrent.info_hash;
    rig.session.add_torrent(torrent, Availability::Empty);

    let fetch = rig.broker.read_piece(id, 0, TIMEOUT);
    let Rig { broker, .. } = rig;
    drop(broker);
    assert_eq!(
        fetch.await,
        Err(FetchError::Cancelled {
            key: PieceKey::new(id, 0),
            reason: CancelReason::BrokerClosed,
        })
    );
    Ok(())
}

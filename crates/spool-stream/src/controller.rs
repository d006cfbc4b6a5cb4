//! Range streaming controller: turns out-of-order piece deliveries into an
//! ordered byte stream for one HTTP range.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use spool_events::{EventBus, ObserverId, SubscriptionFlags};
use spool_torrent_core::{InfoHash, PieceDeadline, PieceEngine, PieceIndex, TorrentError};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::broker::{PieceBroker, PieceData, PieceFetch};
use crate::error::{CancelReason, FetchError, PlanError, StreamError};
use crate::queue::PieceQueue;
use crate::range::{RangeRequest, StreamPlan};
use crate::registry::StreamRegistry;
use crate::requests::{RequestHandle, RequestState, RequestTracker};
use crate::settings::StreamSettings;
use crate::sink::{ByteSink, SinkError};
use crate::window::StreamWindow;

/// Result of one stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Bytes written to the sink; always an exact prefix of the range.
    pub bytes_sent: u64,
    /// Why the session ended.
    pub result: Result<(), StreamError>,
}

impl StreamOutcome {
    /// Whether the whole range was sent.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.result.is_ok()
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match &self.result {
            Ok(()) => "completed",
            Err(err) => err.label(),
        }
    }
}

/// Serves byte ranges of torrent files while the engine is still fetching
/// them.
///
/// Each session registers a [`PieceQueue`] on the bus, raises the priority
/// of its range, keeps deadline hints on its window, and falls back to the
/// [`PieceBroker`] when a piece is late. Everything the session changed in
/// the engine is undone when it ends, except where an overlapping session
/// still needs it.
pub struct RangeStreamer {
    engine: Arc<dyn PieceEngine>,
    bus: EventBus,
    broker: Arc<PieceBroker>,
    registry: StreamRegistry,
    tracker: RequestTracker,
    settings: StreamSettings,
}

impl RangeStreamer {
    /// Controller over `engine`, receiving deliveries through `bus`.
    ///
    /// `broker` must be subscribed to the same bus and ticked by the pump.
    #[must_use]
    pub fn new(
        engine: Arc<dyn PieceEngine>,
        bus: EventBus,
        broker: Arc<PieceBroker>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            engine,
            bus,
            broker,
            registry: StreamRegistry::new(),
            tracker: RequestTracker::new(),
            settings,
        }
    }

    /// Tunables in effect.
    #[must_use]
    pub const fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// In-flight download table.
    #[must_use]
    pub const fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Number of live sessions across all torrents.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.registry.active()
    }

    /// Resolve a request for file `file_index` with an optional `Range`
    /// header value.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the torrent is unknown, the file index is
    /// out of range, or the range cannot be satisfied.
    pub fn plan(
        &self,
        torrent: InfoHash,
        file_index: usize,
        range: Option<&str>,
    ) -> Result<StreamPlan, PlanError> {
        let layout = self
            .engine
            .layout(torrent)
            .ok_or(PlanError::UnknownTorrent { torrent })?;
        StreamPlan::resolve(torrent, &layout, file_index, RangeRequest::parse(range))
    }

    /// Stream `plan` into `sink` until the range is sent or the session
    /// fails. Engine state touched by the session is restored on every exit
    /// path.
    pub async fn stream<S>(&self, plan: &StreamPlan, sink: &mut S) -> StreamOutcome
    where
        S: ByteSink + ?Sized,
    {
        let progress = self.tracker.register(
            plan.torrent,
            &plan.file_path,
            plan.first_byte,
            plan.length,
            plan.file_size,
            plan.first_piece,
        );
        let mut bytes_sent = 0;
        let result = if plan.length == 0 {
            Ok(())
        } else {
            let mut session = self.open_session(plan);
            self.run(&mut session, plan, sink, &progress, &mut bytes_sent)
                .await
        };

        match &result {
            Ok(()) => info!(
                torrent = %plan.torrent,
                file = %plan.file_path,
                bytes_sent,
                "stream session finished"
            ),
            Err(err) => warn!(
                torrent = %plan.torrent,
                file = %plan.file_path,
                bytes_sent,
                reason = err.label(),
                error = %err,
                "stream session ended early"
            ),
        }
        StreamOutcome { bytes_sent, result }
    }

    fn open_session(&self, plan: &StreamPlan) -> SessionGuard<'_> {
        let window = StreamWindow::new(
            plan.first_piece,
            plan.end_piece,
            self.settings.max_in_flight(plan.piece_length),
        );
        let queue = Arc::new(PieceQueue::new(plan.torrent, window));
        let pieces = plan.first_piece..plan.end_piece;

        self.registry
            .acquire(&queue, pieces.clone(), self.engine.as_ref());
        self.bus
            .subscribe(&queue, &PieceQueue::TAGS, SubscriptionFlags::NONE);

        let elevated: Vec<_> = pieces
            .clone()
            .map(|piece| (piece, self.settings.elevated_priority))
            .collect();
        if let Err(err) = self.engine.prioritize_pieces(plan.torrent, &elevated) {
            warn!(torrent = %plan.torrent, error = %err, "failed to raise range priority");
        }

        info!(
            torrent = %plan.torrent,
            file = %plan.file_path,
            first_byte = plan.first_byte,
            length = plan.length,
            first_piece = plan.first_piece,
            end_piece = plan.end_piece,
            window = window.end() - window.begin(),
            "stream session started"
        );

        let mut session = SessionGuard {
            streamer: self,
            queue,
            pieces,
            armed_end: window.begin(),
        };
        for piece in window.begin()..window.end() {
            session.arm(piece, self.settings.deadline_step * (piece - window.begin()));
        }
        session
    }

    async fn run<S>(
        &self,
        session: &mut SessionGuard<'_>,
        plan: &StreamPlan,
        sink: &mut S,
        progress: &RequestHandle,
        bytes_sent: &mut u64,
    ) -> Result<(), StreamError>
    where
        S: ByteSink + ?Sized,
    {
        let mut offset = plan.first_offset;
        let mut left = plan.length;
        for piece in plan.first_piece..plan.end_piece {
            progress.set_state(RequestState::WaitingForEngine, piece);
            let buffer = self.await_piece(session, piece, &*sink).await?;

            let take = left.min(u64::from(plan.piece_length - offset));
            let start = usize::try_from(offset).unwrap_or(usize::MAX);
            let end = start + usize::try_from(take).unwrap_or(usize::MAX);
            if buffer.len() < end {
                debug!(
                    torrent = %plan.torrent,
                    piece,
                    len = buffer.len(),
                    expected = end,
                    "short piece delivered"
                );
                return Err(StreamError::ReadInterrupted { piece });
            }

            if let Some(admitted) = session.queue.advance() {
                session.arm(admitted, self.settings.deadline_step * (admitted - piece));
            }

            progress.set_state(RequestState::WritingToSocket, piece);
            self.write(sink, buffer.slice(start..end)).await?;
            *bytes_sent += take;
            progress.add_bytes(take);
            left -= take;
            offset = 0;
        }
        Ok(())
    }

    /// Wait until `piece` is the smallest held piece.
    async fn await_piece<S>(
        &self,
        session: &mut SessionGuard<'_>,
        piece: PieceIndex,
        sink: &S,
    ) -> Result<Bytes, StreamError>
    where
        S: ByteSink + ?Sized,
    {
        let torrent = session.queue.torrent();
        let started = Instant::now();
        let mut fetch: Option<PieceFetch> = None;
        loop {
            if let Some(buffer) = session.queue.take(piece) {
                return Ok(buffer);
            }
            if let Some(reason) = session.queue.closed() {
                return Err(StreamError::TorrentGone { reason });
            }
            if sink.is_closed() {
                return Err(StreamError::ClientGone);
            }
            let waited = started.elapsed();
            if waited >= self.settings.piece_stall_timeout {
                return Err(StreamError::PieceStalled { piece });
            }
            let slice = self
                .settings
                .piece_wait_slice
                .min(self.settings.piece_stall_timeout - waited);

            tokio::select! {
                () = session.queue.notified() => {}
                outcome = poll_fetch(fetch.as_mut()) => {
                    fetch = None;
                    match outcome {
                        Ok(data) => {
                            session.queue.offer(piece, data.buffer);
                        }
                        Err(FetchError::Cancelled { reason: CancelReason::TorrentRemoved, .. }) => {
                            return Err(StreamError::TorrentGone {
                                reason: CancelReason::TorrentRemoved,
                            });
                        }
                        Err(err) => {
                            debug!(torrent = %torrent, piece, error = %err, "piece fetch failed");
                        }
                    }
                }
                () = tokio::time::sleep(slice) => {
                    trace!(torrent = %torrent, piece, waited_ms = started.elapsed().as_millis(), "piece still missing");
                    if fetch.is_none() {
                        fetch = Some(self.broker.read_piece(torrent, piece, self.settings.fetch_timeout));
                    }
                    session.arm(piece, Duration::ZERO);
                }
            }
        }
    }

    async fn write<S>(&self, sink: &mut S, mut chunk: Bytes) -> Result<(), StreamError>
    where
        S: ByteSink + ?Sized,
    {
        let started = Instant::now();
        loop {
            match sink.try_write(chunk) {
                Ok(()) => return Ok(()),
                Err(SinkError::Closed) => return Err(StreamError::ClientGone),
                Err(SinkError::Full(returned)) => {
                    if started.elapsed() >= self.settings.write_stall_timeout {
                        return Err(StreamError::WriteStalled);
                    }
                    chunk = returned;
                    tokio::time::sleep(self.settings.write_retry_backoff).await;
                }
            }
        }
    }
}

async fn poll_fetch(fetch: Option<&mut PieceFetch>) -> Result<PieceData, FetchError> {
    match fetch {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

/// Engine and bus state held by one live session.
struct SessionGuard<'a> {
    streamer: &'a RangeStreamer,
    queue: Arc<PieceQueue>,
    pieces: Range<PieceIndex>,
    armed_end: PieceIndex,
}

impl SessionGuard<'_> {
    fn arm(&mut self, piece: PieceIndex, deadline: Duration) {
        self.armed_end = self.armed_end.max(piece + 1);
        let outcome = self.streamer.engine.set_piece_deadline(
            self.queue.torrent(),
            PieceDeadline {
                piece,
                deadline,
                alert_when_available: true,
            },
        );
        match outcome {
            Ok(()) | Err(TorrentError::Unsupported { .. }) => {}
            Err(err) => {
                debug!(torrent = %self.queue.torrent(), piece, error = %err, "failed to set piece deadline");
            }
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let streamer = self.streamer;
        let torrent = self.queue.torrent();
        streamer.bus.unsubscribe(ObserverId::of(self.queue.as_ref()));
        let release = streamer.registry.release(&self.queue, self.pieces.clone());

        let begin = self.queue.window().begin();
        for piece in begin..self.armed_end {
            if release.in_use.contains(&piece) {
                continue;
            }
            if let Err(err) = streamer.engine.reset_piece_deadline(torrent, piece) {
                trace!(torrent = %torrent, piece, error = %err, "piece deadline not reset");
            }
        }
        if !release.restore.is_empty()
            && let Err(err) = streamer.engine.prioritize_pieces(torrent, &release.restore)
        {
            warn!(torrent = %torrent, error = %err, "failed to restore piece priorities");
        }
    }
}

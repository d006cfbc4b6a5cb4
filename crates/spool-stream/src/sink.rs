//! Non-blocking byte sinks a stream session writes into.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

/// Why a chunk was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink is full; the chunk is handed back for a later retry.
    Full(Bytes),
    /// The reader went away.
    Closed,
}

/// Destination for streamed bytes. Writes never block: a full sink returns
/// the chunk and the caller decides how long to keep retrying.
pub trait ByteSink: Send {
    /// Write a whole chunk.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Full`] with the chunk when it cannot be accepted
    /// yet and [`SinkError::Closed`] when the reader is gone.
    fn try_write(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Whether the reader is gone.
    fn is_closed(&self) -> bool;
}

/// Body item carried to the HTTP layer.
pub type BodyChunk = Result<Bytes, io::Error>;

/// Sink backed by a bounded channel whose receiver feeds a response body.
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<BodyChunk>,
}

impl ChannelSink {
    /// Channel of `depth` chunks (at least one) and its sink end.
    #[must_use]
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<BodyChunk>) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        (Self { sender }, receiver)
    }

    /// End the body with `error` so the reader sees a failed transfer.
    /// Best effort: nothing is queued when the channel is full or closed.
    pub fn abort(self, error: io::Error) {
        let _ = self.sender.try_send(Err(error));
    }
}

impl ByteSink for ChannelSink {
    fn try_write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.sender.try_send(Ok(chunk)).map_err(|err| match err {
            mpsc::error::TrySendError::Full(item) => {
                SinkError::Full(item.unwrap_or_default())
            }
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Sink that collects everything into memory.
///
/// It can be told to refuse a number of writes, to stop accepting
/// altogether, or to close after a byte count, which covers the slow and
/// disappearing client cases.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: BytesMut,
    writes: usize,
    refuse_next: usize,
    stalled: bool,
    close_after: Option<usize>,
    closed: bool,
}

impl MemorySink {
    /// Accepting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report full for the next `writes` attempts.
    #[must_use]
    pub const fn refusing(mut self, writes: usize) -> Self {
        self.refuse_next = writes;
        self
    }

    /// Report full forever.
    #[must_use]
    pub const fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    /// Close once at least `bytes` have been accepted.
    #[must_use]
    pub const fn closing_after(mut self, bytes: usize) -> Self {
        self.close_after = Some(bytes);
        self
    }

    /// Close the sink now.
    pub const fn close(&mut self) {
        self.closed = true;
    }

    /// Bytes accepted so far.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of accepted chunks.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }
}

impl ByteSink for MemorySink {
    fn try_write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.stalled {
            return Err(SinkError::Full(chunk));
        }
        if self.refuse_next > 0 {
            self.refuse_next -= 1;
            return Err(SinkError::Full(chunk));
        }
        self.data.extend_from_slice(&chunk);
        self.writes += 1;
        if self
            .close_after
            .is_some_and(|limit| self.data.len() >= limit)
        {
            self.closed = true;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

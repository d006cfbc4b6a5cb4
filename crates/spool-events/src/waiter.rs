//! One-shot waits on the next event of a kind.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::payloads::Event;
use crate::topics::EventKind;

/// Single-fulfilment handle returned by [`crate::EventBus::wait_for`].
///
/// Resolves to `Some(event)` when the next event of its kind is dispatched or
/// to `None` once the bus is aborted. Awaiting the handle directly is the same
/// as calling [`EventWaiter::wait`].
#[derive(Debug)]
pub struct EventWaiter {
    kind: EventKind,
    receiver: oneshot::Receiver<Option<Event>>,
}

impl EventWaiter {
    pub(crate) const fn new(kind: EventKind, receiver: oneshot::Receiver<Option<Event>>) -> Self {
        Self { kind, receiver }
    }

    /// Kind this waiter is registered for.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Suspend until the waiter is fulfilled.
    pub async fn wait(self) -> Option<Event> {
        self.await
    }

    /// Suspend for at most `limit`; `None` on timeout or abort.
    pub async fn wait_timeout(self, limit: Duration) -> Option<Event> {
        tokio::time::timeout(limit, self).await.ok().flatten()
    }

    /// Block the current thread until the waiter is fulfilled.
    ///
    /// Must not be called from inside an async runtime worker.
    #[must_use]
    pub fn wait_blocking(self) -> Option<Event> {
        self.receiver.blocking_recv().ok().flatten()
    }
}

impl Future for EventWaiter {
    type Output = Option<Event>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.ok().flatten())
    }
}

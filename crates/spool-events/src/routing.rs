//! Observer registry, synchronous fan-out and waiter fulfilment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::payloads::Event;
use crate::topics::{EventKind, EventTag};
use crate::waiter::EventWaiter;

/// Upper bound on distinct tags a single observer may hold.
pub const MAX_TAGS_PER_OBSERVER: usize = 64;

/// Receiver of dispatched events.
///
/// Handlers run synchronously on the dispatching thread and must not block.
/// They may subscribe or unsubscribe (themselves or others) while running.
pub trait EventObserver: Send + Sync {
    /// Handle one event of a kind the observer is subscribed to.
    fn handle_event(&self, event: &Event);
}

/// Identity of an observer: the address of the observer value.
///
/// Derived from a reference so it can be recomputed inside `Drop`. Zero-sized
/// observer types share addresses and must not be used with the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(usize);

impl ObserverId {
    /// Identity of `observer`.
    #[must_use]
    pub fn of<T: ?Sized>(observer: &T) -> Self {
        Self(std::ptr::from_ref(observer).cast::<()>().addr())
    }
}

/// Opaque flag bits stored alongside a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubscriptionFlags(u32);

impl SubscriptionFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Wrap raw flag bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Snapshot of one observer's registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Kinds in registration order.
    pub kinds: Vec<EventKind>,
    /// Flags supplied on the last subscribe call.
    pub flags: SubscriptionFlags,
}

#[derive(Clone)]
struct ObserverEntry {
    id: ObserverId,
    observer: Weak<dyn EventObserver>,
}

type WaiterSender = oneshot::Sender<Option<Event>>;

struct Registry {
    observers: [Vec<ObserverEntry>; EventKind::COUNT],
    subscriptions: HashMap<ObserverId, Subscription>,
    waiters: [Vec<WaiterSender>; EventKind::COUNT],
    aborted: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            observers: std::array::from_fn(|_| Vec::new()),
            subscriptions: HashMap::new(),
            waiters: std::array::from_fn(|_| Vec::new()),
            aborted: false,
        }
    }
}

impl Registry {
    fn detach(&mut self, id: ObserverId) -> bool {
        let Some(previous) = self.subscriptions.remove(&id) else {
            return false;
        };
        for kind in previous.kinds {
            self.observers[kind.slot()].retain(|entry| entry.id != id);
        }
        true
    }

    fn is_subscribed(&self, id: ObserverId, kind: EventKind) -> bool {
        self.subscriptions
            .get(&id)
            .is_some_and(|subscription| subscription.kinds.contains(&kind))
    }
}

/// Shared event bus. Clones share the same registry.
///
/// A single mutex guards observer lists, subscriptions, waiters and the abort
/// flag. It is never held while an observer runs or a waiter is fulfilled.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    /// Construct an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for `tags`, replacing any previous registration.
    ///
    /// Unknown tags and duplicates are skipped and lists are truncated to
    /// [`MAX_TAGS_PER_OBSERVER`] entries. Returns the number of kinds now
    /// held; an observer left with none is fully unsubscribed.
    pub fn subscribe<O>(&self, observer: &Arc<O>, tags: &[EventTag], flags: SubscriptionFlags) -> usize
    where
        O: EventObserver + 'static,
    {
        let id = ObserverId::of(observer.as_ref());
        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn EventObserver> = weak;

        let mut kinds = Vec::new();
        for tag in tags.iter().take(MAX_TAGS_PER_OBSERVER) {
            match EventKind::from_tag(*tag) {
                Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Some(_) => {}
                None => debug!(tag = tag.0, "ignoring unknown event tag"),
            }
        }

        let held = kinds.len();
        let mut registry = self.lock_registry();
        registry.detach(id);
        if held > 0 {
            for kind in &kinds {
                registry.observers[kind.slot()].push(ObserverEntry {
                    id,
                    observer: weak.clone(),
                });
            }
            registry.subscriptions.insert(id, Subscription { kinds, flags });
        }
        held
    }

    /// Remove `id` from every kind. Idempotent; returns whether anything was
    /// registered. Safe to call from the observer's own `Drop`.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.lock_registry().detach(id)
    }

    /// Current registration for `id`.
    #[must_use]
    pub fn subscription(&self, id: ObserverId) -> Option<Subscription> {
        self.lock_registry().subscriptions.get(&id).cloned()
    }

    /// Number of observers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock_registry().observers[kind.slot()].len()
    }

    /// Number of live one-shot waiters for `kind`.
    #[must_use]
    pub fn pending_waiters(&self, kind: EventKind) -> usize {
        self.lock_registry().waiters[kind.slot()]
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }

    /// Deliver `events` in order.
    ///
    /// For each event the observer list of its kind is copied, then each
    /// observer still subscribed and alive is invoked in subscription order.
    /// Afterwards every waiter for the kind is fulfilled with its own clone.
    /// Returns the number of observer invocations.
    pub fn dispatch<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = Event>,
    {
        let mut delivered = 0;
        for event in events {
            let kind = event.kind();
            let snapshot = self.lock_registry().observers[kind.slot()].clone();

            for entry in snapshot {
                if !self.lock_registry().is_subscribed(entry.id, kind) {
                    continue;
                }
                let Some(observer) = entry.observer.upgrade() else {
                    continue;
                };
                observer.handle_event(&event);
                delivered += 1;
            }

            let waiters = std::mem::take(&mut self.lock_registry().waiters[kind.slot()]);
            if !waiters.is_empty() {
                trace!(kind = kind.name(), waiters = waiters.len(), "fulfilling event waiters");
            }
            for waiter in waiters {
                let _ = waiter.send(Some(event.clone()));
            }
        }
        delivered
    }

    /// Register a one-shot wait for the next event of `kind`.
    ///
    /// Resolves to `None` immediately when the bus is already aborted.
    #[must_use]
    pub fn wait_for(&self, kind: EventKind) -> EventWaiter {
        let (sender, receiver) = oneshot::channel();
        let mut registry = self.lock_registry();
        if registry.aborted {
            drop(registry);
            let _ = sender.send(None);
        } else {
            let queue = &mut registry.waiters[kind.slot()];
            queue.retain(|waiter| !waiter.is_closed());
            queue.push(sender);
        }
        EventWaiter::new(kind, receiver)
    }

    /// Close the bus: every outstanding waiter resolves to `None`, as does
    /// every later [`EventBus::wait_for`]. Observers keep receiving events.
    pub fn abort(&self) {
        let pending: Vec<WaiterSender> = {
            let mut registry = self.lock_registry();
            registry.aborted = true;
            registry.waiters.iter_mut().flat_map(std::mem::take).collect()
        };
        debug!(waiters = pending.len(), "event bus aborted");
        for waiter in pending {
            let _ = waiter.send(None);
        }
    }

    /// Whether [`EventBus::abort`] has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.lock_registry().aborted
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::InfoHash;

    struct Noop;

    impl EventObserver for Noop {
        fn handle_event(&self, _event: &Event) {}
    }

    // Non-zero-sized so each instance has its own address.
    struct Counter(std::sync::atomic::AtomicUsize);

    impl EventObserver for Counter {
        fn handle_event(&self, _event: &Event) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn removed() -> Event {
        Event::TorrentRemoved {
            torrent: InfoHash::new([1; InfoHash::LEN]),
        }
    }

    #[test]
    fn subscribe_skips_unknown_and_duplicate_tags() {
        let bus = EventBus::new();
        let observer = Arc::new(Counter(0.into()));
        let held = bus.subscribe(
            &observer,
            &[
                EventKind::TorrentRemoved.tag(),
                EventTag(200),
                EventKind::TorrentRemoved.tag(),
                EventKind::PieceRead.tag(),
            ],
            SubscriptionFlags::from_bits(3),
        );
        assert_eq!(held, 2);

        let subscription = bus.subscription(ObserverId::of(observer.as_ref()));
        assert_eq!(
            subscription,
            Some(Subscription {
                kinds: vec![EventKind::TorrentRemoved, EventKind::PieceRead],
                flags: SubscriptionFlags::from_bits(3),
            })
        );
        assert_eq!(bus.subscriber_count(EventKind::TorrentRemoved), 1);
    }

    #[test]
    fn resubscribe_replaces_previous_tags() {
        let bus = EventBus::new();
        let observer = Arc::new(Counter(0.into()));
        bus.subscribe(&observer, &[EventKind::TorrentRemoved.tag()], SubscriptionFlags::NONE);
        bus.subscribe(&observer, &[EventKind::PieceRead.tag()], SubscriptionFlags::NONE);

        assert_eq!(bus.subscriber_count(EventKind::TorrentRemoved), 0);
        assert_eq!(bus.subscriber_count(EventKind::PieceRead), 1);
        assert_eq!(bus.dispatch([removed()]), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent_for_unknown_observers() {
        let bus = EventBus::new();
        let observer = Noop;
        assert!(!bus.unsubscribe(ObserverId::of(&observer)));
        assert!(!bus.unsubscribe(ObserverId::of(&observer)));
    }

    #[test]
    fn dropped_observers_are_skipped() {
        let bus = EventBus::new();
        let observer = Arc::new(Counter(0.into()));
        bus.subscribe(&observer, &[EventKind::TorrentRemoved.tag()], SubscriptionFlags::NONE);
        drop(observer);
        assert_eq!(bus.dispatch([removed()]), 0);
    }

    #[test]
    fn flags_report_containment() {
        let flags = SubscriptionFlags::from_bits(0b101);
        assert!(flags.contains(SubscriptionFlags::from_bits(0b100)));
        assert!(!flags.contains(SubscriptionFlags::from_bits(0b010)));
        assert!(flags.contains(SubscriptionFlags::NONE));
    }
}

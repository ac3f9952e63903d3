//! Fan-out of events to subscribers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

/// Identifies a subscription for [`EventDispatcher::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// The receiving end of a subscription.
///
/// Dropping it unsubscribes on the next dispatch.
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Returns the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

struct Registry<T> {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, mpsc::UnboundedSender<T>>,
}

/// Delivers each event to every current subscriber, in registration order.
///
/// Delivery and registry changes are serialized: once
/// [`unsubscribe`](Self::unsubscribe) returns, the subscriber receives
/// nothing more, and a dispatch never skips a subscriber that stays
/// registered.
pub struct EventDispatcher<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for EventDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: Clone> EventDispatcher<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: BTreeMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        // No code path panics mid-update, so a poisoned registry is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscribers.insert(id, sender);
        trace!(id = id.0, "subscribed");
        Subscription { id, receiver }
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        trace!(id = id.0, removed, "unsubscribed");
        removed
    }

    /// Delivers `event` to every subscriber and returns how many got it.
    pub fn dispatch(&self, event: T) -> usize {
        let mut registry = self.lock();
        let mut delivered = 0;
        registry.subscribers.retain(|id, sender| {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                trace!(id = id.0, "pruning dropped subscription");
                false
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl<T: Clone> Default for EventDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

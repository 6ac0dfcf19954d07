use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one attached observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A push to one subscriber could not be delivered because its receiving
/// end is gone. The subscriber is dropped from the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("subscriber {0} disconnected; message dropped")]
pub struct DeliveryFailure(pub SubscriberId);

/// Outcome of a single [`BroadcastHub::publish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: Vec<DeliveryFailure>,
}

/// Receiving end handed to an observer by [`BroadcastHub::subscribe`].
#[derive(Debug)]
pub struct Subscription<M> {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message. `None` once the hub has let go of this
    /// subscriber and every queued message has been read.
    pub async fn recv(&mut self) -> Option<M> {
        self.rx.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<M> {
        self.rx.try_recv().ok()
    }
}

/// Fan-out of messages to every registered subscriber.
///
/// Each subscriber owns an unbounded queue, so `publish` never blocks and
/// never skips a message for a slow reader. Ordering across publishes is the
/// caller's order; callers that publish from several threads must serialize
/// `publish` and `subscribe` themselves (the engine does so under its lock).
#[derive(Debug)]
pub struct BroadcastHub<M> {
    subscribers: BTreeMap<SubscriberId, mpsc::UnboundedSender<M>>,
}

impl<M> Default for BroadcastHub<M> {
    fn default() -> Self {
        Self {
            subscribers: BTreeMap::new(),
        }
    }
}

impl<M: Clone> BroadcastHub<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer and queue `current` as its first message.
    pub fn subscribe(&mut self, current: M) -> Subscription<M> {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(current);
        self.subscribers.insert(id, tx);
        tracing::info!(%id, subscribers = self.subscribers.len(), "subscriber attached");
        Subscription { id, rx }
    }

    /// Remove an observer. Returns whether it was still registered; repeated
    /// calls and calls after a failed delivery are harmless.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::info!(%id, subscribers = self.subscribers.len(), "subscriber detached");
        }
        removed
    }

    /// Deliver `message` to every subscriber. Subscribers whose receiver has
    /// been dropped are removed and reported; the rest still receive it.
    pub fn publish(&mut self, message: &M) -> PublishReport {
        let mut report = PublishReport::default();
        self.subscribers.retain(|id, tx| match tx.send(message.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(_) => {
                let failure = DeliveryFailure(*id);
                tracing::debug!(error = %failure, "dropping subscriber");
                report.failed.push(failure);
                false
            }
        });
        report
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

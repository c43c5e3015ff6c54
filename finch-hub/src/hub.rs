use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use crate::message::Message;
use crate::queue::SubscriberQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Fan-out point for captured frames and telemetry. The Hub itself owns
/// no sockets; a subscriber's queue is owned by whoever drives its
/// writer task (typically a `finch-server` connection task), and the
/// Hub holds only a weak reference keyed by subscriber id so a
/// disconnected subscriber disappears from future broadcasts without
/// any explicit teardown race.
#[derive(Default)]
pub struct Hub {
    subscribers: Mutex<HashMap<SubscriberId, Weak<SubscriberQueue>>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Hub::default()
    }

    /// Registers a new subscriber and returns the queue its writer task
    /// should `recv()` from. The caller owns the `Arc`; once it (and any
    /// clones) are dropped the subscriber is implicitly unregistered.
    pub fn register(&self) -> (SubscriberId, Arc<SubscriberQueue>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(SubscriberQueue::default());
        self.subscribers.lock().insert(id, Arc::downgrade(&queue));
        (id, queue)
    }

    /// Explicit removal, used when a writer task observes a socket
    /// close or unrecoverable send error.
    pub fn unregister(&self, id: SubscriberId) {
        self.subscribers.lock().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.prune();
        self.subscribers.lock().len()
    }

    /// Enqueues `msg` for one subscriber. A no-op if the subscriber has
    /// already disconnected. Never blocks.
    pub fn enqueue(&self, id: SubscriberId, msg: Message) {
        let queue = self.subscribers.lock().get(&id).and_then(Weak::upgrade);
        match queue {
            Some(queue) => queue.push(msg),
            None => warn!("enqueue to unknown or disconnected subscriber {id:?}"),
        }
    }

    /// Snapshots the subscriber set and applies `f` to each
    /// independently. `f` returning `None` skips that subscriber (used
    /// to honor per-subscriber preferences such as `stream=false`). A
    /// panic or early return inside one call never reaches the others:
    /// the loop simply moves on to the next snapshot entry.
    pub fn broadcast(&self, mut f: impl FnMut(SubscriberId) -> Option<Message>) {
        let snapshot: Vec<(SubscriberId, Weak<SubscriberQueue>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, weak)| (*id, weak.clone()))
            .collect();
        for (id, weak) in snapshot {
            let Some(queue) = weak.upgrade() else { continue };
            if let Some(msg) = f(id) {
                queue.push(msg);
            }
        }
    }

    fn prune(&self) {
        self.subscribers.lock().retain(|_, weak| weak.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_the_handle_removes_the_subscriber() {
        let hub = Hub::new();
        let (_id, handle) = hub.register();
        assert_eq!(hub.subscriber_count(), 1);
        drop(handle);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn broadcast_reaches_every_live_subscriber() {
        let hub = Hub::new();
        let (id_a, queue_a) = hub.register();
        let (id_b, queue_b) = hub.register();
        hub.broadcast(|id| Some(Message::Text(format!("{id:?}"))));
        assert_eq!(queue_a.len(), 1);
        assert_eq!(queue_b.len(), 1);
        let _ = (id_a, id_b);
    }

    #[test]
    fn a_failing_subscriber_does_not_block_the_others() {
        let hub = Hub::new();
        let (failing_id, failing_queue) = hub.register();
        let (_other_id, other_queue) = hub.register();
        hub.unregister(failing_id);
        drop(failing_queue);
        hub.broadcast(|_id| Some(Message::Text("telemetry".into())));
        assert_eq!(other_queue.len(), 1);
    }

    #[test]
    fn enqueue_to_a_disconnected_subscriber_is_silently_dropped() {
        let hub = Hub::new();
        let (id, handle) = hub.register();
        drop(handle);
        hub.enqueue(id, Message::Text("too late".into()));
    }

    #[tokio::test]
    async fn per_subscriber_order_is_preserved_under_broadcast() {
        let hub = Hub::new();
        let (_id, queue) = hub.register();
        for n in 0..3 {
            hub.broadcast(move |_id| Some(Message::Text(n.to_string())));
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            if let Message::Text(s) = queue.recv().await {
                seen.push(s);
            }
        }
        assert_eq!(seen, vec!["0", "1", "2"]);
    }
}

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::message::Message;

/// Fixed-capacity, drop-oldest queue belonging to one subscriber.
/// Producers never block; a full queue silently drops its oldest entry
/// to make room for the newest.
pub struct SubscriberQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Message>>,
    notify: Notify,
}

impl SubscriberQueue {
    pub const DEFAULT_CAPACITY: usize = 3;

    pub fn new(capacity: usize) -> Self {
        SubscriberQueue {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Never blocks. Drops the oldest entry first if at capacity.
    pub fn push(&self, msg: Message) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(msg);
        drop(queue);
        self.notify.notify_one();
    }

    /// Waits for and removes the oldest still-queued message, in FIFO
    /// order relative to other messages enqueued for this subscriber.
    pub async fn recv(&self) -> Message {
        loop {
            let notified = self.notify.notified();
            if let Some(msg) = self.inner.lock().pop_front() {
                return msg;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriberQueue {
    fn default() -> Self {
        SubscriberQueue::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_oldest_and_keeps_newest() {
        let queue = SubscriberQueue::new(3);
        queue.push(Message::Text("1".into()));
        queue.push(Message::Text("2".into()));
        queue.push(Message::Text("3".into()));
        queue.push(Message::Text("4".into()));
        assert_eq!(queue.len(), 3);
        let mut seen = Vec::new();
        while let Some(msg) = queue.inner.lock().pop_front() {
            if let Message::Text(s) = msg {
                seen.push(s);
            }
        }
        assert_eq!(seen, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn recv_preserves_fifo_order() {
        let queue = SubscriberQueue::new(3);
        queue.push(Message::Text("a".into()));
        queue.push(Message::Text("b".into()));
        let Message::Text(first) = queue.recv().await else {
            panic!("expected text")
        };
        let Message::Text(second) = queue.recv().await else {
            panic!("expected text")
        };
        assert_eq!(first, "a");
        assert_eq!(second, "b");
    }

    #[tokio::test]
    async fn recv_waits_for_a_later_push() {
        let queue = std::sync::Arc::new(SubscriberQueue::new(3));
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };
        tokio::task::yield_now().await;
        queue.push(Message::Text("late".into()));
        let Message::Text(got) = reader.await.unwrap() else {
            panic!("expected text")
        };
        assert_eq!(got, "late");
    }
}

//! Per-subscriber bounded queues fanning frames and telemetry out to
//! many WebSocket writer tasks. Freshness over completeness: a stalled
//! subscriber loses its oldest unread message, never the newest.

mod hub;
mod message;
mod queue;

pub use hub::{Hub, SubscriberId};
pub use message::Message;
pub use queue::SubscriberQueue;

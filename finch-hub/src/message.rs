use std::sync::Arc;

/// What a subscriber's writer task puts on the wire. A `TextAndBinary`
/// pair is delivered as both halves, text first, with nothing from any
/// other subscriber's pair interleaved between them — that interleaving
/// guarantee is per-subscriber since each has its own writer task.
#[derive(Debug, Clone)]
pub enum Message {
    Text(String),
    TextAndBinary(String, Arc<[u8]>),
}

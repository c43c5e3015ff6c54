use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A captured, encoded still image plus its sensor metadata.
///
/// `payload` is shared (`Arc`) because the broadcast hub fans the same
/// encoded bytes out to every streaming subscriber without re-encoding.
#[derive(Debug, Clone)]
pub struct Frame {
    pub payload: Arc<[u8]>,
    pub metadata: FrameMetadata,
}

/// Per-frame metadata. `frame_number` is ever-increasing and is the
/// basis for the monotonicity property subscribers rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub frame_number: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub timestamp_nanos: u64,
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

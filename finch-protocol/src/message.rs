use crate::control::ControlValue;
use crate::frame::FrameMetadata;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outbound `image_response` payload. Externally tagged on `image` so
/// the wire shape is exactly `{"image": "next", "metadata": {...}}` or
/// `{"image": "here", "metadata": {...}, "image_base64": "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "image", rename_all = "lowercase")]
pub enum ImageResponse {
    Next { metadata: FrameMetadata },
    Here {
        metadata: FrameMetadata,
        image_base64: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FpsUpdate {
    pub image_capture_reader_fps: f64,
    pub image_capture_capture_fps: f64,
    pub system_controller_fps: f64,
}

/// One outbound WebSocket text frame. Each variant is externally
/// tagged with its wire key (e.g. `ServerMessage::FpsUpdate` serializes
/// as `{"fps_update": {...}}`), matching the protocol table.
#[derive(Debug, Clone, Serialize)]
pub enum ServerMessage {
    #[serde(rename = "image_response")]
    ImageResponse(ImageResponse),
    #[serde(rename = "fps_update")]
    FpsUpdate(FpsUpdate),
    #[serde(rename = "update_controls")]
    UpdateControls(BTreeMap<String, ControlValue>),
    #[serde(rename = "LED_TIME")]
    LedTimeEcho { value: u32 },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_response_next_wire_shape() {
        let msg = ServerMessage::ImageResponse(ImageResponse::Next {
            metadata: FrameMetadata {
                frame_number: 1,
                width: 640,
                height: 480,
                pixel_format: "jpeg".into(),
                timestamp_nanos: 0,
                extra: Default::default(),
            },
        });
        let json = msg.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["image_response"]["image"], "next");
        assert_eq!(value["image_response"]["metadata"]["frame_number"], 1);
    }

    #[test]
    fn led_time_echo_wire_shape() {
        let msg = ServerMessage::LedTimeEcho { value: 410 };
        let json = msg.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["LED_TIME"]["value"], 410);
    }
}

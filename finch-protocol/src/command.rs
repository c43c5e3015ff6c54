use crate::control::{CaptureMode, ControlValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wraps the `{"value": ...}` shape used by most single-valued inbound
/// commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueWrapper<T> {
    pub value: T,
}

/// A `slm_image` payload: either the literal marker `"next"` (meaning a
/// binary frame follows on the socket) or an inline base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlmImage {
    Next,
    Base64(String),
}

impl<'de> Deserialize<'de> for SlmImage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(if s == "next" {
            SlmImage::Next
        } else {
            SlmImage::Base64(s)
        })
    }
}

impl Serialize for SlmImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            SlmImage::Next => serializer.serialize_str("next"),
            SlmImage::Base64(s) => serializer.serialize_str(s),
        }
    }
}

/// One inbound WebSocket text frame. The original protocol allows
/// several of these keys to arrive together in a single JSON object
/// (e.g. a sweep toggle alongside a control update), so this is a flat
/// struct of optional fields rather than an enum — every present field
/// is dispatched independently, in the order listed in the external
/// interface table, by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientMessage {
    pub set_control: Option<BTreeMap<String, ControlValue>>,
    pub sweep_enable: Option<ValueWrapper<bool>>,
    pub update_controls: Option<serde_json::Value>,
    pub capture_mode: Option<ValueWrapper<CaptureMode>>,
    #[serde(rename = "LED_TIME")]
    pub led_time: Option<ValueWrapper<u32>>,
    #[serde(rename = "LED_WIDTH")]
    pub led_width: Option<ValueWrapper<u32>>,
    #[serde(rename = "WAVE_DURATION")]
    pub wave_duration: Option<ValueWrapper<u32>>,
    #[serde(rename = "ILLUMINATION_MODE")]
    pub illumination_mode: Option<ValueWrapper<String>>,
    pub stream_frames: Option<ValueWrapper<bool>>,
    pub use_base64_encoding: Option<ValueWrapper<bool>>,
    pub send_fps_updates: Option<ValueWrapper<bool>>,
    pub slm_image_url: Option<String>,
    pub slm_image: Option<SlmImage>,
    pub image_request: Option<serde_json::Value>,
}

/// Which of the three LEDs fire in a sub-field, decoded from one octal
/// digit of an `ILLUMINATION_MODE` value (bit 0 = red, bit 1 = green,
/// bit 2 = blue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IlluminationSubfield {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

/// Decodes a 3-octal-digit `ILLUMINATION_MODE` string such as `"701"`
/// into its three per-subfield LED selections. Returns `None` if the
/// string is not exactly three octal digits.
pub fn decode_illumination_mode(s: &str) -> Option<[IlluminationSubfield; 3]> {
    let digits: Vec<u8> = s
        .chars()
        .map(|c| c.to_digit(8).map(|d| d as u8))
        .collect::<Option<_>>()?;
    if digits.len() != 3 {
        return None;
    }
    let mut out = [IlluminationSubfield::default(); 3];
    for (slot, digit) in out.iter_mut().zip(digits) {
        *slot = IlluminationSubfield {
            red: digit & 0b001 != 0,
            green: digit & 0b010 != 0,
            blue: digit & 0b100 != 0,
        };
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_key_message() {
        let json = r#"{"sweep_enable": {"value": true}, "LED_TIME": {"value": 400}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sweep_enable.unwrap().value, true);
        assert_eq!(msg.led_time.unwrap().value, 400);
        assert!(msg.slm_image.is_none());
    }

    #[test]
    fn client_message_serializes_with_original_field_names() {
        let mut msg = ClientMessage::default();
        msg.led_time = Some(ValueWrapper { value: 400 });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"LED_TIME\":{\"value\":400}"));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.led_time.unwrap().value, 400);
    }

    #[test]
    fn parses_slm_image_next_marker() {
        let json = r#"{"slm_image": "next"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.slm_image, Some(SlmImage::Next));
    }

    #[test]
    fn parses_slm_image_base64() {
        let json = r#"{"slm_image": "aGVsbG8="}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg.slm_image,
            Some(SlmImage::Base64("aGVsbG8=".to_string()))
        );
    }

    #[test]
    fn decodes_illumination_mode() {
        let modes = decode_illumination_mode("701").unwrap();
        assert_eq!(
            modes[0],
            IlluminationSubfield {
                red: true,
                green: true,
                blue: true
            }
        );
        assert_eq!(
            modes[1],
            IlluminationSubfield {
                red: false,
                green: false,
                blue: false
            }
        );
        assert_eq!(
            modes[2],
            IlluminationSubfield {
                red: true,
                green: false,
                blue: false
            }
        );
    }

    #[test]
    fn rejects_malformed_illumination_mode() {
        assert!(decode_illumination_mode("89").is_none());
        assert!(decode_illumination_mode("70").is_none());
    }
}

use finch_protocol::{CaptureMode, ControlValue, NativeControl};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Mjpeg,
    Yuyv,
}

/// A single unencoded frame as handed up from a backend's native
/// driver. The Camera Reader is responsible for turning this into the
/// [`finch_protocol::Frame`] payload that gets broadcast.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera backend unavailable: {0}")]
    Unavailable(String),
    #[error("unknown control: {0}")]
    UnknownControl(String),
    #[error("control value out of range: {0}")]
    OutOfRange(String),
}

/// The capability interface every camera backend implements. Per-backend
/// name translation (native control names to the common vocabulary in
/// [`finch_protocol::COMMON_CONTROL_NAMES`]) lives entirely inside the
/// implementation; callers never see native names.
pub trait CameraBackend: Send {
    fn open(&mut self) -> Result<(), CameraError>;
    fn close(&mut self) -> Result<(), CameraError>;

    /// `blocking = true` waits for the sensor's native frame cadence;
    /// `blocking = false` returns `Ok(None)` if nothing is ready yet.
    fn take(&mut self, blocking: bool) -> Result<Option<RawFrame>, CameraError>;

    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), CameraError>;
    fn get_control(&mut self, name: &str) -> Result<ControlValue, CameraError>;

    /// Returns the backend's controls in native form. `colour_gains`
    /// stays vector-valued here; splitting it into `colour_gain_red` /
    /// `colour_gain_blue` is the Coordinator's job, not the backend's.
    fn list_controls(&self) -> Vec<NativeControl>;

    fn set_mode(&mut self, mode: CaptureMode) -> Result<(), CameraError>;
}

/// Encodes a raw frame into the wire container (JPEG by default).
/// MJPEG-native backends pass the bytes through unchanged; other
/// formats are converted.
pub fn encode_jpeg(raw: &RawFrame, quality: u8) -> Result<Vec<u8>, CameraError> {
    match raw.format {
        PixelFormat::Mjpeg => Ok(raw.data.clone()),
        PixelFormat::Rgb8 => {
            let mut out = Vec::new();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            encoder
                .encode(&raw.data, raw.width, raw.height, image::ExtendedColorType::Rgb8)
                .map_err(|e| CameraError::Unavailable(format!("jpeg encode failed: {e}")))?;
            Ok(out)
        }
        PixelFormat::Yuyv => {
            let rgb = yuyv_to_rgb8(&raw.data, raw.width, raw.height);
            let mut out = Vec::new();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            encoder
                .encode(&rgb, raw.width, raw.height, image::ExtendedColorType::Rgb8)
                .map_err(|e| CameraError::Unavailable(format!("jpeg encode failed: {e}")))?;
            Ok(out)
        }
    }
}

fn yuyv_to_rgb8(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            rgb.push(r);
            rgb.push(g);
            rgb.push(b);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjpeg_passthrough() {
        let raw = RawFrame {
            width: 2,
            height: 2,
            format: PixelFormat::Mjpeg,
            data: vec![0xff, 0xd8, 0xff, 0xd9],
        };
        let encoded = encode_jpeg(&raw, 75).unwrap();
        assert_eq!(encoded, raw.data);
    }

    #[test]
    fn rgb8_encodes_to_nonempty_jpeg() {
        let raw = RawFrame {
            width: 4,
            height: 4,
            format: PixelFormat::Rgb8,
            data: vec![128u8; 4 * 4 * 3],
        };
        let encoded = encode_jpeg(&raw, 75).unwrap();
        assert!(!encoded.is_empty());
        // JPEG SOI marker
        assert_eq!(&encoded[0..2], &[0xff, 0xd8]);
    }
}

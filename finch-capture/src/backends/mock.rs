use crate::backend::{CameraBackend, CameraError, PixelFormat, RawFrame};
use finch_protocol::{CaptureMode, ControlDescriptor, ControlValue, NativeControl};

/// Synthesizes frames at a fixed size without touching any real sensor.
/// Used by tests and by `finch-cli`/`finch-server` dry runs.
pub struct MockBackend {
    open: bool,
    width: u32,
    height: u32,
    frame_number: u64,
    exposure_absolute: i64,
    gain: f64,
    auto_exposure: bool,
    colour_gain_red: f64,
    colour_gain_blue: f64,
    mode: CaptureMode,
}

impl MockBackend {
    pub fn new(width: u32, height: u32) -> Self {
        MockBackend {
            open: false,
            width,
            height,
            frame_number: 0,
            exposure_absolute: 1000,
            gain: 1.0,
            auto_exposure: true,
            colour_gain_red: 1.0,
            colour_gain_blue: 1.0,
            mode: CaptureMode::Preview,
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        MockBackend::new(640, 480)
    }
}

impl CameraBackend for MockBackend {
    fn open(&mut self) -> Result<(), CameraError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.open = false;
        Ok(())
    }

    fn take(&mut self, _blocking: bool) -> Result<Option<RawFrame>, CameraError> {
        if !self.open {
            return Err(CameraError::Unavailable("camera not open".into()));
        }
        self.frame_number += 1;
        let pixel = (self.frame_number % 256) as u8;
        let data = vec![pixel; (self.width * self.height * 3) as usize];
        Ok(Some(RawFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb8,
            data,
        }))
    }

    fn set_control(&mut self, name: &str, value: ControlValue) -> Result<(), CameraError> {
        match name {
            "exposure_absolute" => {
                let v = value
                    .as_i64()
                    .ok_or_else(|| CameraError::OutOfRange("exposure_absolute must be an integer".into()))?;
                if !(1..=100_000).contains(&v) {
                    return Err(CameraError::OutOfRange(format!(
                        "exposure_absolute {v} outside [1, 100000]"
                    )));
                }
                self.exposure_absolute = v;
            }
            "gain" => {
                let v = value
                    .as_f64()
                    .ok_or_else(|| CameraError::OutOfRange("gain must be numeric".into()))?;
                self.gain = v;
            }
            "auto_exposure" => {
                let v = value
                    .as_bool()
                    .ok_or_else(|| CameraError::OutOfRange("auto_exposure must be boolean".into()))?;
                self.auto_exposure = v;
            }
            "colour_gain_red" => {
                self.colour_gain_red = value
                    .as_f64()
                    .ok_or_else(|| CameraError::OutOfRange("colour_gain_red must be numeric".into()))?;
            }
            "colour_gain_blue" => {
                self.colour_gain_blue = value
                    .as_f64()
                    .ok_or_else(|| CameraError::OutOfRange("colour_gain_blue must be numeric".into()))?;
            }
            other => return Err(CameraError::UnknownControl(other.to_string())),
        }
        Ok(())
    }

    fn get_control(&mut self, name: &str) -> Result<ControlValue, CameraError> {
        match name {
            "exposure_absolute" => Ok(ControlValue::Integer(self.exposure_absolute)),
            "gain" => Ok(ControlValue::Float(self.gain)),
            "auto_exposure" => Ok(ControlValue::Boolean(self.auto_exposure)),
            "colour_gain_red" => Ok(ControlValue::Float(self.colour_gain_red)),
            "colour_gain_blue" => Ok(ControlValue::Float(self.colour_gain_blue)),
            other => Err(CameraError::UnknownControl(other.to_string())),
        }
    }

    fn list_controls(&self) -> Vec<NativeControl> {
        vec![
            NativeControl::Scalar(ControlDescriptor::Integer {
                id: "exposure_absolute".into(),
                name: "exposure_absolute".into(),
                range: (1, 100_000),
                default: 1000,
                value: self.exposure_absolute,
                step: 1,
            }),
            NativeControl::Scalar(ControlDescriptor::Float {
                id: "gain".into(),
                name: "gain".into(),
                range: (0.0, 16.0),
                default: 1.0,
                value: self.gain,
                step: 0.1,
            }),
            NativeControl::Scalar(ControlDescriptor::Boolean {
                id: "auto_exposure".into(),
                name: "auto_exposure".into(),
                default: true,
                value: self.auto_exposure,
            }),
            NativeControl::ColourGains {
                range: (0.0, 8.0),
                default: (1.0, 1.0),
                value: (self.colour_gain_red, self.colour_gain_blue),
            },
        ]
    }

    fn set_mode(&mut self, mode: CaptureMode) -> Result<(), CameraError> {
        self.mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_increment_until_closed() {
        let mut backend = MockBackend::new(8, 4);
        backend.open().unwrap();
        let a = backend.take(false).unwrap().unwrap();
        let b = backend.take(false).unwrap().unwrap();
        assert_eq!(a.width, 8);
        assert_ne!(a.data[0], 0);
        assert_ne!(a.data, b.data);
        backend.close().unwrap();
        assert!(backend.take(false).is_err());
    }

    #[test]
    fn colour_gains_reports_as_vector_control() {
        let backend = MockBackend::default();
        let controls = backend.list_controls();
        assert!(controls
            .iter()
            .any(|c| matches!(c, NativeControl::ColourGains { .. })));
    }

    #[test]
    fn rejects_exposure_out_of_range() {
        let mut backend = MockBackend::default();
        let err = backend
            .set_control("exposure_absolute", ControlValue::Integer(0))
            .unwrap_err();
        assert!(matches!(err, CameraError::OutOfRange(_)));
    }

    #[test]
    fn unknown_control_is_rejected() {
        let mut backend = MockBackend::default();
        let err = backend.get_control("not_a_real_control").unwrap_err();
        assert!(matches!(err, CameraError::UnknownControl(_)));
    }
}

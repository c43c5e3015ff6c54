use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use finch_protocol::{CaptureMode, ControlValue, Frame, FrameMetadata, NativeControl};
use tracing::{error, warn};

use crate::backend::{encode_jpeg, CameraBackend, CameraError};
use crate::fps::FrameRateMonitor;
use crate::mailbox::Mailbox;

/// Owns a camera backend, a dedicated blocking reader thread, and the
/// mailbox the Coordinator's tick loop drains non-blocking. This is the
/// boundary the spec calls the Camera Reader plus Capture Controller: the
/// reader thread talks to the backend, the controller is what everything
/// else talks to.
pub struct CaptureController {
    backend: Arc<parking_lot::Mutex<Box<dyn CameraBackend>>>,
    mailbox: Arc<Mailbox>,
    reader_fps: Arc<parking_lot::Mutex<FrameRateMonitor>>,
    consumer_fps: parking_lot::Mutex<FrameRateMonitor>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    jpeg_quality: u8,
    next_frame_number: Arc<std::sync::atomic::AtomicU64>,
}

impl CaptureController {
    pub fn new(backend: Box<dyn CameraBackend>, jpeg_quality: u8) -> Self {
        CaptureController {
            backend: Arc::new(parking_lot::Mutex::new(backend)),
            mailbox: Arc::new(Mailbox::new()),
            reader_fps: Arc::new(parking_lot::Mutex::new(FrameRateMonitor::standard())),
            consumer_fps: parking_lot::Mutex::new(FrameRateMonitor::standard()),
            running: Arc::new(AtomicBool::new(false)),
            reader: None,
            jpeg_quality,
            next_frame_number: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    /// Opens the backend and starts the blocking reader thread.
    pub fn open(&mut self) -> Result<(), CameraError> {
        self.backend.lock().open()?;
        self.running.store(true, Ordering::SeqCst);

        let backend = Arc::clone(&self.backend);
        let mailbox = Arc::clone(&self.mailbox);
        let reader_fps = Arc::clone(&self.reader_fps);
        let running = Arc::clone(&self.running);
        let quality = self.jpeg_quality;
        let frame_counter = Arc::clone(&self.next_frame_number);

        self.reader = Some(
            std::thread::Builder::new()
                .name("finch-capture-reader".into())
                .spawn(move || {
                    while running.load(Ordering::SeqCst) {
                        let raw = {
                            let mut backend = backend.lock();
                            backend.take(true)
                        };
                        match raw {
                            Ok(Some(raw)) => {
                                let jpeg = match encode_jpeg(&raw, quality) {
                                    Ok(jpeg) => jpeg,
                                    Err(e) => {
                                        error!("jpeg encode failed: {e}");
                                        continue;
                                    }
                                };
                                let frame_number =
                                    frame_counter.fetch_add(1, Ordering::SeqCst);
                                reader_fps.lock().tick();
                                mailbox.publish(Frame {
                                    payload: Arc::from(jpeg),
                                    metadata: FrameMetadata {
                                        frame_number,
                                        width: raw.width,
                                        height: raw.height,
                                        pixel_format: "jpeg".into(),
                                        timestamp_nanos: 0,
                                        extra: Default::default(),
                                    },
                                });
                            }
                            Ok(None) => continue,
                            Err(e) => {
                                warn!("camera read failed, reader thread stopping: {e}");
                                break;
                            }
                        }
                    }
                })
                .expect("spawning the capture reader thread"),
        );
        Ok(())
    }

    /// Stops the reader thread and closes the backend. Idempotent.
    pub fn close(&mut self) -> Result<(), CameraError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            // The reader is parked in a blocking `take()`; it will observe
            // `running == false` on its next iteration, which happens as
            // soon as the backend yields a frame or errors out.
            let _ = handle.join();
        }
        self.backend.lock().close()
    }

    /// Non-blocking: the Coordinator's tick loop calls this every tick and
    /// never stalls if no frame is ready.
    pub fn take(&self) -> Option<Frame> {
        let frame = self.mailbox.take();
        if frame.is_some() {
            self.consumer_fps.lock().tick();
        }
        frame
    }

    pub fn reader_fps(&self) -> f64 {
        self.reader_fps.lock().fps()
    }

    pub fn consumer_fps(&self) -> f64 {
        self.consumer_fps.lock().fps()
    }

    pub fn set_control(&self, name: &str, value: ControlValue) -> Result<(), CameraError> {
        self.backend.lock().set_control(name, value)
    }

    pub fn get_control(&self, name: &str) -> Result<ControlValue, CameraError> {
        self.backend.lock().get_control(name)
    }

    pub fn list_controls(&self) -> Vec<NativeControl> {
        self.backend.lock().list_controls()
    }

    pub fn set_mode(&self, mode: CaptureMode) -> Result<(), CameraError> {
        self.backend.lock().set_mode(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockBackend;
    use std::time::Duration;

    #[test]
    fn frames_flow_from_reader_to_controller() {
        let mut controller = CaptureController::new(Box::new(MockBackend::new(4, 4)), 80);
        controller.open().unwrap();
        let mut frame = None;
        for _ in 0..200 {
            if let Some(f) = controller.take() {
                frame = Some(f);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        controller.close().unwrap();
        let frame = frame.expect("reader thread should have published at least one frame");
        assert_eq!(frame.metadata.pixel_format, "jpeg");
        assert!(!frame.payload.is_empty());
    }

    #[test]
    fn take_on_idle_controller_is_none_without_blocking() {
        let mut controller = CaptureController::new(Box::new(MockBackend::new(4, 4)), 80);
        controller.open().unwrap();
        controller.close().unwrap();
        assert!(controller.take().is_none());
    }

    #[test]
    fn control_passthrough_reaches_the_backend() {
        let mut controller = CaptureController::new(Box::new(MockBackend::new(4, 4)), 80);
        controller.open().unwrap();
        controller
            .set_control("gain", ControlValue::Float(2.5))
            .unwrap();
        assert_eq!(
            controller.get_control("gain").unwrap(),
            ControlValue::Float(2.5)
        );
        controller.close().unwrap();
    }
}

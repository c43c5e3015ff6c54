//! The Camera Reader and Capture Controller: a backend-agnostic frame
//! source feeding a single-slot mailbox the Coordinator drains without
//! ever blocking its tick loop.

mod backend;
pub mod backends;
mod controller;
mod fps;
mod mailbox;

pub use backend::{encode_jpeg, CameraBackend, CameraError, PixelFormat, RawFrame};
pub use controller::CaptureController;
pub use fps::FrameRateMonitor;
pub use mailbox::Mailbox;

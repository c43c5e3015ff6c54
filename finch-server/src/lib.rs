//! The Session Coordinator: wires the Sequencer, Capture Controller, and
//! broadcast Hub together behind an HTTP/WebSocket transport, and owns
//! the process's configuration and shutdown sequence.

pub mod config;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod http;

pub use config::{CameraBackendKind, FinchConfig, GpioBackendKind, SweepConfig};
pub use coordinator::Coordinator;
pub use display::{DisplayError, DisplaySink, NoopDisplay};
pub use error::{AppError, ConfigError};
pub use http::{build_router, AppState};

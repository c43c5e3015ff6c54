//! Wire types for the optical instrument's control/capture WebSocket
//! protocol, and the `TriggerConfig` they mutate.

mod command;
mod control;
mod frame;
mod message;
mod trigger;

pub use command::{
    decode_illumination_mode, ClientMessage, IlluminationSubfield, SlmImage, ValueWrapper,
};
pub use control::{CaptureMode, ControlDescriptor, ControlValue, NativeControl, COMMON_CONTROL_NAMES};
pub use frame::{Frame, FrameMetadata};
pub use message::{FpsUpdate, ImageResponse, ServerMessage};
pub use trigger::{TriggerConfig, TriggerConfigError, TriggerPolarity};

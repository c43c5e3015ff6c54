//! Owns the lifecycle of compiled waveforms and the microcoded control
//! program that dispatches them in response to the external trigger.

mod coprocessor;
mod mock;
#[cfg(feature = "pigpio-socket")]
mod pigpio_socket;
mod script;
mod sequencer;

pub use coprocessor::{ControlProgramHandle, GpioCoprocessor, GpioError, ScriptState, WaveformId};
pub use mock::MockCoprocessor;
#[cfg(feature = "pigpio-socket")]
pub use pigpio_socket::PigpioSocket;
pub use script::{render_microcode, N_CADENCE};
pub use sequencer::{Sequencer, SequencerError, SequencerState};

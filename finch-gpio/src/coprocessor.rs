use finch_wave::PulseStep;
use thiserror::Error;

/// Handle to a waveform loaded on the coprocessor. `-1` denotes a
/// waveform that has been deleted; a deleted id must never be passed to
/// `run_script`/`update_params` except transiently during an atomic
/// swap (see `Sequencer::update_wave`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveformId(pub i64);

impl WaveformId {
    pub const DELETED: WaveformId = WaveformId(-1);

    pub fn is_deleted(&self) -> bool {
        self.0 < 0
    }
}

/// Handle to a microcoded control program resident on the coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlProgramHandle(pub u32);

/// Lifecycle states of a loaded control program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Initing,
    Halted,
    Running,
    Waiting,
    Failed,
}

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO coprocessor connection unavailable: {0}")]
    HardwareUnavailable(String),
    #[error("GPIO coprocessor resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Capability interface for a GPIO coprocessor: owns the lifecycle of
/// compiled waveforms and a small control program. Implementations may
/// talk to real hardware (the pigpio daemon's socket protocol) or stand
/// in for it in tests.
pub trait GpioCoprocessor: Send {
    fn load_wave(&mut self, steps: &[PulseStep]) -> Result<WaveformId, GpioError>;
    fn delete_wave(&mut self, id: WaveformId) -> Result<(), GpioError>;

    fn load_script(&mut self, microcode: &str) -> Result<ControlProgramHandle, GpioError>;
    fn run_script(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError>;
    fn update_params(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError>;
    fn stop_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError>;
    fn delete_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError>;
    fn script_status(
        &mut self,
        prog: ControlProgramHandle,
    ) -> Result<(ScriptState, Vec<i64>), GpioError>;

    /// Reads the current level of an input pin, µs-resolution per the
    /// external interface contract. Used by tests and diagnostics; the
    /// real control-program loop polls `TRIG_IN` on the coprocessor's
    /// own thread, not through this call.
    fn read_pin(&mut self, pin: u8) -> Result<bool, GpioError>;
}

impl GpioCoprocessor for Box<dyn GpioCoprocessor> {
    fn load_wave(&mut self, steps: &[PulseStep]) -> Result<WaveformId, GpioError> {
        (**self).load_wave(steps)
    }
    fn delete_wave(&mut self, id: WaveformId) -> Result<(), GpioError> {
        (**self).delete_wave(id)
    }
    fn load_script(&mut self, microcode: &str) -> Result<ControlProgramHandle, GpioError> {
        (**self).load_script(microcode)
    }
    fn run_script(&mut self, prog: ControlProgramHandle, params: &[i64]) -> Result<(), GpioError> {
        (**self).run_script(prog, params)
    }
    fn update_params(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError> {
        (**self).update_params(prog, params)
    }
    fn stop_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError> {
        (**self).stop_script(prog)
    }
    fn delete_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError> {
        (**self).delete_script(prog)
    }
    fn script_status(
        &mut self,
        prog: ControlProgramHandle,
    ) -> Result<(ScriptState, Vec<i64>), GpioError> {
        (**self).script_status(prog)
    }
    fn read_pin(&mut self, pin: u8) -> Result<bool, GpioError> {
        (**self).read_pin(pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_sentinel_is_recognized() {
        assert!(WaveformId::DELETED.is_deleted());
        assert!(!WaveformId(0).is_deleted());
    }
}

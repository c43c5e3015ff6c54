use crate::coprocessor::{ControlProgramHandle, GpioCoprocessor, GpioError, ScriptState, WaveformId};
use finch_wave::PulseStep;
use std::collections::HashMap;

/// In-process stand-in for a real pigpio daemon, used by tests and by
/// `finch-cli --dry-run`. Waveform ids and script handles are simple
/// counters; deleted waveforms are removed from the live set so that
/// referencing them is a visible programming error rather than a
/// silent no-op.
#[derive(Debug, Default)]
pub struct MockCoprocessor {
    next_wave_id: i64,
    live_waves: HashMap<i64, Vec<PulseStep>>,
    next_script_id: u32,
    scripts: HashMap<u32, ScriptEntry>,
    pin_levels: HashMap<u8, bool>,
    max_live_waves: Option<usize>,
}

#[derive(Debug)]
struct ScriptEntry {
    state: ScriptState,
    params: Vec<i64>,
}

impl MockCoprocessor {
    pub fn new() -> Self {
        MockCoprocessor::default()
    }

    /// Simulates a coprocessor with a bounded waveform slot table, so
    /// `ResourceExhausted` can be exercised in tests.
    pub fn with_wave_capacity(capacity: usize) -> Self {
        MockCoprocessor {
            max_live_waves: Some(capacity),
            ..Default::default()
        }
    }

    pub fn set_pin(&mut self, pin: u8, level: bool) {
        self.pin_levels.insert(pin, level);
    }

    pub fn live_wave_count(&self) -> usize {
        self.live_waves.len()
    }
}

impl GpioCoprocessor for MockCoprocessor {
    fn load_wave(&mut self, steps: &[PulseStep]) -> Result<WaveformId, GpioError> {
        if let Some(cap) = self.max_live_waves {
            if self.live_waves.len() >= cap {
                return Err(GpioError::ResourceExhausted(
                    "no free waveform slots".into(),
                ));
            }
        }
        let id = self.next_wave_id;
        self.next_wave_id += 1;
        self.live_waves.insert(id, steps.to_vec());
        Ok(WaveformId(id))
    }

    fn delete_wave(&mut self, id: WaveformId) -> Result<(), GpioError> {
        self.live_waves.remove(&id.0);
        Ok(())
    }

    fn load_script(&mut self, _microcode: &str) -> Result<ControlProgramHandle, GpioError> {
        let id = self.next_script_id;
        self.next_script_id += 1;
        self.scripts.insert(
            id,
            ScriptEntry {
                state: ScriptState::Halted,
                params: Vec::new(),
            },
        );
        Ok(ControlProgramHandle(id))
    }

    fn run_script(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError> {
        let entry = self.script_entry_mut(prog)?;
        entry.params = params.to_vec();
        entry.state = ScriptState::Running;
        Ok(())
    }

    fn update_params(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError> {
        let entry = self.script_entry_mut(prog)?;
        entry.params = params.to_vec();
        Ok(())
    }

    fn stop_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError> {
        let entry = self.script_entry_mut(prog)?;
        entry.state = ScriptState::Halted;
        Ok(())
    }

    fn delete_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError> {
        self.scripts.remove(&prog.0);
        Ok(())
    }

    fn script_status(
        &mut self,
        prog: ControlProgramHandle,
    ) -> Result<(ScriptState, Vec<i64>), GpioError> {
        let entry = self.script_entry_mut(prog)?;
        Ok((entry.state, entry.params.clone()))
    }

    fn read_pin(&mut self, pin: u8) -> Result<bool, GpioError> {
        Ok(*self.pin_levels.get(&pin).unwrap_or(&false))
    }
}

impl MockCoprocessor {
    fn script_entry_mut(
        &mut self,
        prog: ControlProgramHandle,
    ) -> Result<&mut ScriptEntry, GpioError> {
        self.scripts
            .get_mut(&prog.0)
            .ok_or_else(|| GpioError::HardwareUnavailable("unknown script handle".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_delete_wave_round_trips() {
        let mut pig = MockCoprocessor::new();
        let id = pig.load_wave(&[]).unwrap();
        assert_eq!(pig.live_wave_count(), 1);
        pig.delete_wave(id).unwrap();
        assert_eq!(pig.live_wave_count(), 0);
    }

    #[test]
    fn exhausted_capacity_errors() {
        let mut pig = MockCoprocessor::with_wave_capacity(1);
        pig.load_wave(&[]).unwrap();
        assert!(matches!(
            pig.load_wave(&[]),
            Err(GpioError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn script_params_update_without_changing_state() {
        let mut pig = MockCoprocessor::new();
        let prog = pig.load_script("...").unwrap();
        pig.run_script(prog, &[1, 2]).unwrap();
        pig.update_params(prog, &[3, 4]).unwrap();
        let (state, params) = pig.script_status(prog).unwrap();
        assert_eq!(state, ScriptState::Running);
        assert_eq!(params, vec![3, 4]);
    }
}

use crate::coprocessor::{ControlProgramHandle, GpioCoprocessor, GpioError, WaveformId};
use crate::script::render_microcode;
use finch_protocol::TriggerConfig;
use finch_wave::{compile, schedule, CompileError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Stopped,
    Armed,
    Running,
    Updating,
}

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error(transparent)]
    Hardware(#[from] GpioError),
    #[error("waveform compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("operation invalid in state {0:?}")]
    WrongState(SequencerState),
}

struct WavePair {
    rgb: WaveformId,
    rgb_trig: WaveformId,
}

fn compile_pair(config: &TriggerConfig) -> Result<(Vec<finch_wave::PulseStep>, Vec<finch_wave::PulseStep>), CompileError> {
    let rgb = compile(schedule(config, false))?;
    let rgb_trig = compile(schedule(config, true))?;
    Ok((rgb, rgb_trig))
}

/// Drives a [`GpioCoprocessor`]'s control program: loads the two
/// precompiled waveforms, runs the microcoded loop, and serializes
/// atomic parameter swaps through `update_wave`/`complete_update`.
///
/// `update_wave` is split from `complete_update` because step 3 of the
/// atomic-update contract ("after a grace period ... delete the prior
/// two waveforms") needs a caller-driven delay; this crate has no
/// opinion on the scheduler running that delay, so it stages the
/// deletion and waits to be told to finish it.
pub struct Sequencer<C: GpioCoprocessor> {
    coprocessor: C,
    state: SequencerState,
    program: Option<ControlProgramHandle>,
    current: Option<WavePair>,
    pending_delete: Option<WavePair>,
    config: TriggerConfig,
}

impl<C: GpioCoprocessor> Sequencer<C> {
    pub fn new(coprocessor: C, config: TriggerConfig) -> Self {
        Sequencer {
            coprocessor,
            state: SequencerState::Stopped,
            program: None,
            current: None,
            pending_delete: None,
            config,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Loads both waveforms for the current config, stores the control
    /// program on the coprocessor (state `Armed`, params at the
    /// zero-sentinel), then runs it with the real ids (state `Running`).
    pub fn start(&mut self) -> Result<(), SequencerError> {
        if self.state != SequencerState::Stopped {
            return Err(SequencerError::WrongState(self.state));
        }
        let (rgb_steps, rgb_trig_steps) = compile_pair(&self.config)?;
        let rgb = self.coprocessor.load_wave(&rgb_steps)?;
        let rgb_trig = self.coprocessor.load_wave(&rgb_trig_steps)?;

        let microcode = render_microcode(self.config.trig_in);
        let prog = self.coprocessor.load_script(&microcode)?;
        self.program = Some(prog);
        self.state = SequencerState::Armed;

        self.coprocessor.run_script(prog, &[rgb.0, rgb_trig.0])?;
        self.current = Some(WavePair { rgb, rgb_trig });
        self.state = SequencerState::Running;
        Ok(())
    }

    /// Begins an atomic waveform swap: compiles and loads new waveforms
    /// for `new_config`, points the running control program at them,
    /// and stages the old waveforms for deletion. A `CompileError`
    /// leaves the previous waveform installed and the state unchanged.
    pub fn update_wave(&mut self, new_config: TriggerConfig) -> Result<(), SequencerError> {
        if self.state != SequencerState::Running {
            return Err(SequencerError::WrongState(self.state));
        }
        let prog = self.program.ok_or(SequencerError::WrongState(self.state))?;

        let (rgb_steps, rgb_trig_steps) = compile_pair(&new_config)?;
        let new_rgb = self.coprocessor.load_wave(&rgb_steps)?;
        let new_rgb_trig = self.coprocessor.load_wave(&rgb_trig_steps)?;

        self.coprocessor
            .update_params(prog, &[new_rgb.0, new_rgb_trig.0])?;

        self.state = SequencerState::Updating;
        let old = self.current.replace(WavePair {
            rgb: new_rgb,
            rgb_trig: new_rgb_trig,
        });
        self.pending_delete = old;
        self.config = new_config;
        Ok(())
    }

    /// Completes a prior `update_wave` once the caller's grace period
    /// has elapsed, deleting the superseded waveforms. Safe to call
    /// even if nothing is pending.
    pub fn complete_update(&mut self) -> Result<(), SequencerError> {
        if let Some(old) = self.pending_delete.take() {
            self.coprocessor.delete_wave(old.rgb)?;
            self.coprocessor.delete_wave(old.rgb_trig)?;
        }
        if self.state == SequencerState::Updating {
            self.state = SequencerState::Running;
        }
        Ok(())
    }

    /// Stops and deletes the control program and both live waveforms,
    /// tolerating failures at each step so a partially torn-down
    /// sequencer never panics during shutdown.
    pub fn stop(&mut self) {
        if let Some(prog) = self.program.take() {
            if let Err(e) = self.coprocessor.stop_script(prog) {
                tracing::warn!("stop_script failed during shutdown: {e}");
            }
            if let Err(e) = self.coprocessor.delete_script(prog) {
                tracing::warn!("delete_script failed during shutdown: {e}");
            }
        }
        for wave in [self.current.take(), self.pending_delete.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.coprocessor.delete_wave(wave.rgb) {
                tracing::warn!("delete_wave failed during shutdown: {e}");
            }
            if let Err(e) = self.coprocessor.delete_wave(wave.rgb_trig) {
                tracing::warn!("delete_wave failed during shutdown: {e}");
            }
        }
        self.state = SequencerState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCoprocessor;

    #[test]
    fn start_transitions_to_running() {
        let mut seq = Sequencer::new(MockCoprocessor::new(), TriggerConfig::default());
        seq.start().unwrap();
        assert_eq!(seq.state(), SequencerState::Running);
    }

    #[test]
    fn update_wave_never_references_a_deleted_id() {
        let mut seq = Sequencer::new(MockCoprocessor::new(), TriggerConfig::default());
        seq.start().unwrap();

        let mut config = TriggerConfig::default();
        config.led_time += 10;
        seq.update_wave(config).unwrap();
        assert_eq!(seq.state(), SequencerState::Updating);
        // the old waveforms are staged, not yet deleted
        assert_eq!(seq.coprocessor.live_wave_count(), 4);

        seq.complete_update().unwrap();
        assert_eq!(seq.state(), SequencerState::Running);
        assert_eq!(seq.coprocessor.live_wave_count(), 2);
    }

    #[test]
    fn compile_error_leaves_previous_waveform_installed() {
        let mut seq = Sequencer::new(MockCoprocessor::new(), TriggerConfig::default());
        seq.start().unwrap();
        let before = seq.coprocessor.live_wave_count();

        // Force a same-pin, same-timestamp collision: green's rising
        // edge lands exactly on red's falling edge.
        let mut bad_config = TriggerConfig::default();
        bad_config.grn_out = bad_config.red_out;
        bad_config.grn_start = bad_config.red_start + bad_config.led_width;

        let err = seq.update_wave(bad_config);
        assert!(err.is_err());
        assert_eq!(seq.state(), SequencerState::Running);
        assert_eq!(seq.coprocessor.live_wave_count(), before);
    }

    #[test]
    fn stop_deletes_everything() {
        let mut seq = Sequencer::new(MockCoprocessor::new(), TriggerConfig::default());
        seq.start().unwrap();
        seq.stop();
        assert_eq!(seq.state(), SequencerState::Stopped);
        assert_eq!(seq.coprocessor.live_wave_count(), 0);
    }
}

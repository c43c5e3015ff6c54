//! Real coprocessor backend: talks to a `pigpiod` daemon over its
//! socket protocol (4 little-endian u32 words per request/response,
//! optional extension data for array-valued commands such as
//! `wave_add_generic`).

use crate::coprocessor::{ControlProgramHandle, GpioCoprocessor, GpioError, ScriptState, WaveformId};
use finch_wave::PulseStep;
use std::io::{Read, Write};
use std::net::TcpStream;

#[allow(dead_code)]
mod cmd {
    pub const WVCLR: u32 = 27;
    pub const WVAG: u32 = 28;
    pub const WVBSY: u32 = 32;
    pub const WVHLT: u32 = 33;
    pub const WVCRE: u32 = 49;
    pub const WVDEL: u32 = 50;
    pub const PROC: u32 = 38; // store script
    pub const PROCR: u32 = 40; // run script
    pub const PROCP: u32 = 45; // script status
    pub const PROCU: u32 = 41; // update script params
    pub const PROCS: u32 = 42; // stop script
    pub const PROCD: u32 = 43; // delete script
    pub const BR1: u32 = 10; // read bank 1
}

pub struct PigpioSocket {
    stream: TcpStream,
}

impl PigpioSocket {
    pub fn connect(addr: &str) -> Result<Self, GpioError> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| GpioError::HardwareUnavailable(e.to_string()))?;
        Ok(PigpioSocket { stream })
    }

    fn request(&mut self, cmd: u32, p1: u32, p2: u32, ext: &[u8]) -> Result<i32, GpioError> {
        let mut buf = Vec::with_capacity(16 + ext.len());
        buf.extend_from_slice(&cmd.to_le_bytes());
        buf.extend_from_slice(&p1.to_le_bytes());
        buf.extend_from_slice(&p2.to_le_bytes());
        buf.extend_from_slice(&(ext.len() as u32).to_le_bytes());
        buf.extend_from_slice(ext);
        self.stream
            .write_all(&buf)
            .map_err(|e| GpioError::HardwareUnavailable(e.to_string()))?;

        let mut reply = [0u8; 16];
        self.stream
            .read_exact(&mut reply)
            .map_err(|e| GpioError::HardwareUnavailable(e.to_string()))?;
        let res = i32::from_le_bytes(reply[12..16].try_into().unwrap());
        Ok(res)
    }

    /// Encodes pulse steps into pigpio's wave pulse wire format: three
    /// u32s per pulse (gpioOn, gpioOff, usDelay).
    fn encode_pulses(steps: &[PulseStep]) -> Vec<u8> {
        let mut ext = Vec::with_capacity(steps.len() * 12);
        for step in steps {
            ext.extend_from_slice(&step.set_mask.to_le_bytes());
            ext.extend_from_slice(&step.clear_mask.to_le_bytes());
            ext.extend_from_slice(&step.delay_us.to_le_bytes());
        }
        ext
    }
}

impl GpioCoprocessor for PigpioSocket {
    fn load_wave(&mut self, steps: &[PulseStep]) -> Result<WaveformId, GpioError> {
        self.request(cmd::WVCLR, 0, 0, &[])?;
        let ext = Self::encode_pulses(steps);
        self.request(cmd::WVAG, 0, 0, &ext)?;
        let id = self.request(cmd::WVCRE, 0, 0, &[])?;
        if id < 0 {
            return Err(GpioError::ResourceExhausted(format!(
                "wave_create failed: {id}"
            )));
        }
        Ok(WaveformId(id as i64))
    }

    fn delete_wave(&mut self, id: WaveformId) -> Result<(), GpioError> {
        if id.is_deleted() {
            return Ok(());
        }
        self.request(cmd::WVDEL, id.0 as u32, 0, &[])?;
        Ok(())
    }

    fn load_script(&mut self, microcode: &str) -> Result<ControlProgramHandle, GpioError> {
        let id = self.request(cmd::PROC, 0, 0, microcode.as_bytes())?;
        if id < 0 {
            return Err(GpioError::HardwareUnavailable(format!(
                "store_script failed: {id}"
            )));
        }
        Ok(ControlProgramHandle(id as u32))
    }

    fn run_script(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError> {
        let ext: Vec<u8> = params
            .iter()
            .flat_map(|p| (*p as u32).to_le_bytes())
            .collect();
        self.request(cmd::PROCR, prog.0, 0, &ext)?;
        Ok(())
    }

    fn update_params(
        &mut self,
        prog: ControlProgramHandle,
        params: &[i64],
    ) -> Result<(), GpioError> {
        let ext: Vec<u8> = params
            .iter()
            .flat_map(|p| (*p as u32).to_le_bytes())
            .collect();
        self.request(cmd::PROCU, prog.0, 0, &ext)?;
        Ok(())
    }

    fn stop_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError> {
        self.request(cmd::PROCS, prog.0, 0, &[])?;
        Ok(())
    }

    fn delete_script(&mut self, prog: ControlProgramHandle) -> Result<(), GpioError> {
        self.request(cmd::PROCD, prog.0, 0, &[])?;
        Ok(())
    }

    fn script_status(
        &mut self,
        prog: ControlProgramHandle,
    ) -> Result<(ScriptState, Vec<i64>), GpioError> {
        let res = self.request(cmd::PROCP, prog.0, 0, &[])?;
        let state = match res {
            0 => ScriptState::Initing,
            1 => ScriptState::Halted,
            2 => ScriptState::Running,
            3 => ScriptState::Waiting,
            _ => ScriptState::Failed,
        };
        Ok((state, Vec::new()))
    }

    fn read_pin(&mut self, pin: u8) -> Result<bool, GpioError> {
        let bank = self.request(cmd::BR1, 0, 0, &[])?;
        Ok(bank & (1 << pin) != 0)
    }
}


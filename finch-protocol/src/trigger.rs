use serde::{Deserialize, Serialize};

/// Polarity of the camera trigger output pulse.
///
/// Different revisions of the original hardware wired the trigger
/// optocoupler both ways; callers must pick one explicitly rather than
/// guess from a single edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerPolarity {
    ActiveHigh,
    ActiveLow,
}

impl Default for TriggerPolarity {
    fn default() -> Self {
        TriggerPolarity::ActiveLow
    }
}

/// Configuration for one illumination/capture cycle.
///
/// All pin fields are GPIO indices in 0..31 and must be pairwise
/// distinct. All timing fields are in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub red_in: u8,
    pub grn_in: u8,
    pub blu_in: u8,

    pub red_out: u8,
    pub grn_out: u8,
    pub blu_out: u8,

    pub trig_out: u8,
    pub trig_in: u8,
    pub strobe_in: u8,

    pub red_start: u32,
    pub grn_start: u32,
    pub blu_start: u32,

    pub led_time: u32,
    pub led_width: u32,

    pub trig_time: u32,
    pub trig_width: u32,

    pub wave_duration: u32,

    pub trig_polarity: TriggerPolarity,
}

impl TriggerConfig {
    /// Checks the invariants from the data model: every phase offset plus
    /// `led_time` plus `led_width` must fit inside `wave_duration`, and no
    /// two pins may alias.
    pub fn validate(&self) -> Result<(), TriggerConfigError> {
        let pins = [
            self.red_in,
            self.grn_in,
            self.blu_in,
            self.red_out,
            self.grn_out,
            self.blu_out,
            self.trig_out,
            self.strobe_in,
        ];
        for pin in pins {
            if pin > 31 {
                return Err(TriggerConfigError::PinOutOfRange(pin));
            }
        }
        for (i, a) in pins.iter().enumerate() {
            for b in &pins[i + 1..] {
                if a == b {
                    return Err(TriggerConfigError::AliasedPins(*a));
                }
            }
        }
        for start in [self.red_start, self.grn_start, self.blu_start] {
            let end = start + self.led_time + self.led_width;
            if end > self.wave_duration {
                return Err(TriggerConfigError::ExceedsCycle {
                    end,
                    wave_duration: self.wave_duration,
                });
            }
        }
        let trig_end = self.trig_time + self.trig_width;
        if trig_end > self.wave_duration {
            return Err(TriggerConfigError::ExceedsCycle {
                end: trig_end,
                wave_duration: self.wave_duration,
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerConfigError {
    #[error("pin {0} is used by more than one role")]
    AliasedPins(u8),
    #[error("pin {0} is out of the valid GPIO range 0..=31")]
    PinOutOfRange(u8),
    #[error("event at {end}us exceeds wave_duration {wave_duration}us")]
    ExceedsCycle { end: u32, wave_duration: u32 },
}

impl Default for TriggerConfig {
    /// Matches the defaults recorded for the real instrument: sequential
    /// RGB phase offsets measured at 2742us/5519us, an 8ms wave, and a
    /// blue-channel external trigger input.
    fn default() -> Self {
        TriggerConfig {
            red_in: 22,
            grn_in: 24,
            blu_in: 25,
            red_out: 17,
            grn_out: 23,
            blu_out: 27,
            trig_out: 5,
            trig_in: 25,
            strobe_in: 6,
            red_start: 5519,
            grn_start: 2742,
            blu_start: 0,
            led_time: 400,
            led_width: 5,
            trig_time: 0,
            trig_width: 8000,
            wave_duration: 8000,
            trig_polarity: TriggerPolarity::ActiveLow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        TriggerConfig::default().validate().unwrap();
    }

    #[test]
    fn aliased_pins_rejected() {
        let mut cfg = TriggerConfig::default();
        cfg.grn_out = cfg.red_out;
        assert_eq!(
            cfg.validate(),
            Err(TriggerConfigError::AliasedPins(cfg.red_out))
        );
    }

    #[test]
    fn overflowing_phase_rejected() {
        let mut cfg = TriggerConfig::default();
        cfg.red_start = cfg.wave_duration;
        assert!(cfg.validate().is_err());
    }
}

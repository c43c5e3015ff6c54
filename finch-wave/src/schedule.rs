use crate::compiler::{BitEvent, Level};
use finch_protocol::{TriggerConfig, TriggerPolarity};

/// Builds the per-cycle event list for one illumination waveform.
///
/// `trigger_camera` selects between the illumination-only cycle and the
/// illumination-plus-camera-trigger cycle the Sequencer alternates
/// between. The caller passes the result to [`crate::compile`].
pub fn schedule(config: &TriggerConfig, trigger_camera: bool) -> Vec<BitEvent> {
    let mut events = Vec::with_capacity(8);

    if trigger_camera {
        let (active_level, idle_level) = match config.trig_polarity {
            TriggerPolarity::ActiveLow => (Level::Low, Level::High),
            TriggerPolarity::ActiveHigh => (Level::High, Level::Low),
        };
        events.push(BitEvent::new(config.trig_out, active_level, config.trig_time));
        events.push(BitEvent::new(
            config.trig_out,
            idle_level,
            config.trig_time + config.trig_width,
        ));
    }

    for (out_pin, start) in [
        (config.red_out, config.red_start),
        (config.grn_out, config.grn_start),
        (config.blu_out, config.blu_start),
    ] {
        let on_at = config.led_time + start;
        events.push(BitEvent::new(out_pin, Level::High, on_at));
        events.push(BitEvent::new(out_pin, Level::Low, on_at + config.led_width));
    }

    events.push(BitEvent::new(
        config.strobe_in,
        Level::High,
        config.wave_duration,
    ));

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    #[test]
    fn schedule_events_fit_within_cycle() {
        let config = TriggerConfig::default();
        for trigger_camera in [false, true] {
            let events = schedule(&config, trigger_camera);
            for ev in &events {
                assert!(ev.time_us <= config.wave_duration);
            }
        }
    }

    #[test]
    fn schedule_compiles_cleanly() {
        let config = TriggerConfig::default();
        let events = schedule(&config, true);
        let steps = compile(events).unwrap();
        let total: u32 = steps.iter().map(|s| s.delay_us).sum();
        assert_eq!(total, config.wave_duration);
    }

    #[test]
    fn active_low_trigger_idles_high() {
        let mut config = TriggerConfig::default();
        config.trig_polarity = TriggerPolarity::ActiveLow;
        let events = schedule(&config, true);
        let first = events
            .iter()
            .find(|e| e.pin == config.trig_out)
            .expect("trigger event present");
        assert_eq!(first.level, Level::Low);
    }
}

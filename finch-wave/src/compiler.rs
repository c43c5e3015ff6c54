use thiserror::Error;

/// Logic level of a single GPIO transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// A single declared GPIO transition. Unordered on input — `compile`
/// sorts by `time_us` before doing anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitEvent {
    pub pin: u8,
    pub level: Level,
    pub time_us: u32,
}

impl BitEvent {
    pub fn new(pin: u8, level: Level, time_us: u32) -> Self {
        BitEvent {
            pin,
            level,
            time_us,
        }
    }
}

/// One hardware pulse: `set_mask`/`clear_mask` apply the moment the
/// step begins, then `delay_us` holds before the next step is
/// processed. `set_mask & clear_mask == 0` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseStep {
    pub set_mask: u32,
    pub clear_mask: u32,
    pub delay_us: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("event at {time}us precedes checkpoint at {prev}us")]
    MonotonicityError { prev: u32, time: u32 },
    #[error("pin {pin} set and cleared within the same step at {time}us")]
    CollisionError { pin: u8, time: u32 },
}

/// Sorts `events` by time and compiles them into a pulse-step sequence.
///
/// This is the entry point real callers use. `compile_sorted` is kept
/// separate so the monotonicity check can be exercised directly against
/// input that was deliberately not sorted.
pub fn compile(mut events: Vec<BitEvent>) -> Result<Vec<PulseStep>, CompileError> {
    events.sort_by_key(|e| e.time_us);
    compile_sorted(&events)
}

/// Compiles an already-time-sorted event sequence. Fails with
/// `MonotonicityError` if a later event precedes an earlier checkpoint,
/// which can only happen if the caller bypassed `compile`'s sort.
pub fn compile_sorted(events: &[BitEvent]) -> Result<Vec<PulseStep>, CompileError> {
    let mut prev = 0u32;
    let mut set_mask = 0u32;
    let mut clear_mask = 0u32;
    let mut steps = Vec::new();

    for ev in events {
        let delay = ev
            .time_us
            .checked_sub(prev)
            .ok_or(CompileError::MonotonicityError {
                prev,
                time: ev.time_us,
            })?;

        if delay > 0 {
            steps.push(PulseStep {
                set_mask,
                clear_mask,
                delay_us: delay,
            });
            set_mask = 0;
            clear_mask = 0;
            prev = ev.time_us;
        }

        let bit = 1u32 << ev.pin;
        match ev.level {
            Level::High => {
                if clear_mask & bit != 0 {
                    return Err(CompileError::CollisionError {
                        pin: ev.pin,
                        time: ev.time_us,
                    });
                }
                set_mask |= bit;
            }
            Level::Low => {
                if set_mask & bit != 0 {
                    return Err(CompileError::CollisionError {
                        pin: ev.pin,
                        time: ev.time_us,
                    });
                }
                clear_mask |= bit;
            }
        }
    }

    if set_mask != 0 || clear_mask != 0 {
        steps.push(PulseStep {
            set_mask,
            clear_mask,
            delay_us: 0,
        });
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(pin: u8) -> u32 {
        1u32 << pin
    }

    #[test]
    fn compiles_simple_cycle() {
        let events = vec![
            BitEvent::new(5, Level::High, 0),
            BitEvent::new(5, Level::Low, 10),
            BitEvent::new(17, Level::High, 400),
            BitEvent::new(17, Level::Low, 404),
            BitEvent::new(23, Level::High, 8000),
        ];
        let steps = compile(events).unwrap();
        assert_eq!(steps.len(), 5);
        let total: u32 = steps.iter().map(|s| s.delay_us).sum();
        assert_eq!(total, 8000);

        // Replay the steps and check the reconstructed pin-level timeline.
        let mut t = 0u32;
        let mut high: std::collections::HashSet<u8> = std::collections::HashSet::new();
        let mut bit5_high_window = None;
        let mut bit17_high_window = None;
        let mut bit23_set_at = None;
        for step in &steps {
            for pin in 0..32u8 {
                if step.set_mask & bit(pin) != 0 {
                    high.insert(pin);
                    if pin == 5 {
                        bit5_high_window = Some(t);
                    }
                    if pin == 17 {
                        bit17_high_window = Some(t);
                    }
                    if pin == 23 {
                        bit23_set_at = Some(t);
                    }
                }
                if step.clear_mask & bit(pin) != 0 {
                    high.remove(&pin);
                }
            }
            t += step.delay_us;
        }
        assert_eq!(bit5_high_window, Some(0));
        assert_eq!(bit17_high_window, Some(400));
        assert_eq!(bit23_set_at, Some(8000));
    }

    #[test]
    fn out_of_order_compile_matches_sorted() {
        let times = [40u32, 10, 30, 5, 35, 20];
        let pins = [3u8, 0, 2, 1, 3, 1];
        let mut unsorted = Vec::new();
        for (i, (&t, &p)) in times.iter().zip(pins.iter()).enumerate() {
            let level = if i % 2 == 0 { Level::High } else { Level::Low };
            unsorted.push(BitEvent::new(p, level, t));
        }
        let mut sorted = unsorted.clone();
        sorted.sort_by_key(|e| e.time_us);

        let from_unsorted = compile(unsorted).unwrap();
        let from_sorted = compile(sorted).unwrap();
        assert_eq!(from_unsorted, from_sorted);

        let total: u32 = from_unsorted.iter().map(|s| s.delay_us).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn mask_disjointness_holds() {
        let events = vec![
            BitEvent::new(1, Level::High, 0),
            BitEvent::new(2, Level::Low, 0),
            BitEvent::new(1, Level::Low, 100),
        ];
        let steps = compile(events).unwrap();
        for step in &steps {
            assert_eq!(step.set_mask & step.clear_mask, 0);
        }
    }

    #[test]
    fn collision_on_same_pin_same_step() {
        let events = vec![
            BitEvent::new(4, Level::High, 50),
            BitEvent::new(4, Level::Low, 50),
        ];
        let err = compile(events).unwrap_err();
        assert_eq!(
            err,
            CompileError::CollisionError { pin: 4, time: 50 }
        );
    }

    #[test]
    fn unsorted_input_fed_directly_fails_monotonicity() {
        let events = [
            BitEvent::new(0, Level::High, 50),
            BitEvent::new(1, Level::High, 10),
        ];
        let err = compile_sorted(&events).unwrap_err();
        assert_eq!(
            err,
            CompileError::MonotonicityError { prev: 50, time: 10 }
        );
    }
}

/// Property-based coverage of `compile`'s "for all inputs" invariants
/// (spec compiler properties: order-independence, mask disjointness,
/// time conservation), generalizing the hand-picked cases in `mod tests`
/// above across arbitrary event sets.
#[cfg(test)]
mod proptests {
    use super::*;
    use quickcheck_macros::quickcheck;

    /// Builds a collision-free single-pin toggle sequence from arbitrary
    /// times: dedup+sort the times, then alternate High/Low so no two
    /// events ever set and clear the same pin in one step.
    fn events_from_times(mut times: Vec<u16>) -> Vec<BitEvent> {
        times.sort_unstable();
        times.dedup();
        times
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let level = if i % 2 == 0 { Level::High } else { Level::Low };
                BitEvent::new(0, level, t as u32)
            })
            .collect()
    }

    #[quickcheck]
    fn compile_is_order_independent(times: Vec<u16>) -> bool {
        let events = events_from_times(times);
        let mut reversed = events.clone();
        reversed.reverse();
        compile(events) == compile(reversed)
    }

    #[quickcheck]
    fn total_delay_conserves_the_last_event_time(times: Vec<u16>) -> bool {
        let events = events_from_times(times);
        let Some(last) = events.last().map(|e| e.time_us) else {
            return true;
        };
        let steps = compile(events).unwrap();
        let total: u32 = steps.iter().map(|s| s.delay_us).sum();
        total == last
    }

    #[quickcheck]
    fn set_and_clear_masks_never_overlap(times: Vec<u16>) -> bool {
        let events = events_from_times(times);
        match compile(events) {
            Ok(steps) => steps.iter().all(|s| s.set_mask & s.clear_mask == 0),
            Err(_) => true,
        }
    }
}

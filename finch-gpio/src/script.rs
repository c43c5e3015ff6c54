/// Number of illumination-only cycles dispatched between successive
/// illumination-plus-camera-trigger cycles. A compile-time invariant of
/// the instrument (the LED strobe runs at the external sync rate while
/// the camera integrates across `N_CADENCE` sub-fields); exposed as a
/// named constant rather than hard-coded twice in the control program
/// text, per the open question in the design notes.
pub const N_CADENCE: u16 = 3;

/// Renders the coprocessor's microcoded control program. The control
/// program text itself is opaque to this crate's logic — only
/// `GpioCoprocessor::load_script` interprets it — but the registers and
/// cadence it implements are a direct contract with [`crate::Sequencer`]:
/// `p0`/`p1` select the RGB/RGB+trigger waveform ids, `p2` names the
/// `TRIG_IN` pin, and the internal repeat counter reloads from
/// `N_CADENCE` rather than a second hard-coded literal.
pub fn render_microcode(trig_in_pin: u8) -> String {
    assert!(N_CADENCE >= 1, "N_CADENCE must be at least 1");
    format!(
        "\
tag 0                  # WAIT_VALID
cmp p0 0
jm  0                  # p0 < 0: not yet armed, retry
cmp v3 0
jnz 1
mov v0 p1              # reload: use RGB+trigger wave
mov v3 {n}
jmp 2
tag 1
mov v0 p0              # use RGB-only wave
dcr v3
tag 2
mov p2 {trig_in}
tag 3                  # WAIT_RISE
r   p2
jz  3
tag 4                  # WAIT_FALL
r   p2
jnz 4
wvtx v0                # FIRE
tag 5                  # WAIT_DONE
mics 100
wvbsy
jnz 5
jmp 0
",
        n = N_CADENCE,
        trig_in = trig_in_pin,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_is_at_least_one() {
        assert!(N_CADENCE >= 1);
    }

    #[test]
    fn microcode_embeds_cadence_and_trigger_pin() {
        let text = render_microcode(25);
        assert!(text.contains(&format!("mov v3 {}", N_CADENCE)));
        assert!(text.contains("mov p2 25"));
    }
}

//! Calibration model: trim loading and per-sample correction.

#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_wrap)]

use adc_engine::calibration::flip_sign_bit;
use adc_engine::mocks::{MockDelay, MockTrim};
use adc_engine::{CalibrationModel, CalibrationParams, Error, FixedGain, InputMode};

proptest::proptest! {
    /// Flipping the sign bit twice restores any 12-bit word.
    #[test]
    fn flip_is_an_involution(raw in 0u16..=0x0FFF) {
        assert_eq!(flip_sign_bit(flip_sign_bit(raw)), raw);
    }

    /// Identity parameters pass every 12-bit raw value through unchanged.
    #[test]
    fn identity_is_pass_through(raw in 0u16..=0x0FFF) {
        for mode in [InputMode::SingleEnded, InputMode::Differential] {
            assert_eq!(CalibrationParams::IDENTITY.apply(raw, mode), raw as i16);
        }
    }

    /// Output always stays inside the 12-bit range, whatever the trim.
    #[test]
    fn output_stays_in_range(raw in 0u16..=u16::MAX, offset in 0u16..=4095, int in 0u16..=3, milli in 0u16..=999) {
        let mut trim = MockTrim::new(
            (offset, (u32::from(int) << 14) | u32::from(milli)),
            (0, 1 << 14),
            0,
        );
        let params = CalibrationModel::load(&mut trim, &mut MockDelay::new(), 0).unwrap();
        let v = params.apply(raw, InputMode::SingleEnded);
        assert!((0..=4095).contains(&v), "{v}");
    }
}

#[test]
fn load_reads_both_modes() {
    let mut trim = MockTrim::new((12, (1 << 14) | 20), (7, 998), 0);
    let params = CalibrationModel::load(&mut trim, &mut MockDelay::new(), 100).unwrap();

    assert_eq!(params.single.offset, 12);
    assert_eq!(
        params.single.gain,
        FixedGain {
            integer: 1,
            fraction_milli: 20
        }
    );
    assert_eq!(params.differential.offset, 7);
    assert_eq!(params.differential.gain.integer, 0);
    assert_eq!(params.differential.gain.fraction_milli, 998);
}

#[test]
fn load_waits_for_trim_in_poll_steps() {
    let mut trim = MockTrim::new((0, 1 << 14), (0, 1 << 14), 5);
    let mut delay = MockDelay::new();
    CalibrationModel::load(&mut trim, &mut delay, 1_000).unwrap();
    assert_eq!(trim.polls(), 6);
    assert_eq!(delay.elapsed_us(), 50);
}

#[test]
fn load_times_out_when_trim_never_ready() {
    let mut trim = MockTrim::never_ready();
    let mut delay = MockDelay::new();
    assert_eq!(
        CalibrationModel::load(&mut trim, &mut delay, 100),
        Err(Error::CalibrationTimeout)
    );
    // Budget is honoured, not exceeded.
    assert_eq!(delay.elapsed_us(), 100);
}

#[test]
fn zero_timeout_checks_once() {
    let mut trim = MockTrim::never_ready();
    assert_eq!(
        CalibrationModel::load(&mut trim, &mut MockDelay::new(), 0),
        Err(Error::CalibrationTimeout)
    );
    assert_eq!(trim.polls(), 1);
}

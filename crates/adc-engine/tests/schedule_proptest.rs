//! Property-based tests for the rate scheduler.
//! Verifies the schedule invariants hold for ALL valid rate vectors, not just
//! the worked examples.

#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use adc_engine::phase::slots_collide;
use adc_engine::{
    compute_schedule, AcquisitionMode, ChannelRequest, Error, SampleCount, SamplingRateHz,
    Schedule,
};
use proptest::prelude::*;

fn requests(rates: &[u32], samples: u16) -> Vec<ChannelRequest> {
    let count = SampleCount::new(samples).unwrap();
    rates
        .iter()
        .map(|&hz| ChannelRequest::new(SamplingRateHz::new(hz).unwrap(), count))
        .collect()
}

/// Rate vectors listed fastest first, as the scheduler requires.
fn sorted_rates(min: u32, max: u32) -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(min..=max, 1..=16).prop_map(|mut v| {
        v.sort_unstable_by(|a, b| b.cmp(a));
        v
    })
}

fn assert_invariants(schedule: &Schedule) {
    let entries = schedule.entries();
    let (used, cycle) = schedule.utilisation();
    assert!(used <= cycle, "oversubscribed: {used} slots in {cycle} ticks");

    for e in entries {
        assert!(e.slot_factor >= 2);
        assert!(e.slot_factor.is_power_of_two());
        assert!(e.phase_offset < schedule.cycle_ticks());
    }
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            assert!(
                !slots_collide(
                    (entries[i].phase_offset, entries[i].slot_factor),
                    (entries[j].phase_offset, entries[j].slot_factor),
                ),
                "channels {i} and {j} share a slot: {entries:?}"
            );
        }
    }
    assert_ne!(schedule.plan.on_cycles, schedule.plan.total_cycles);
}

proptest! {
    /// Any sorted rate vector either schedules cleanly or fails with a
    /// scheduling error, never anything else.
    #[test]
    fn schedule_is_valid_or_rejected(rates in sorted_rates(1_000, 5_000_000), samples in 1u16..=1023) {
        let reqs = requests(&rates, samples);
        match compute_schedule(90_000_000, &reqs, AcquisitionMode::FreeRunning) {
            Ok(schedule) => {
                assert_eq!(schedule.entries().len(), rates.len());
                assert_invariants(&schedule);
            }
            Err(Error::SchedulingInfeasible | Error::InvalidSamplingRate { .. }) => {}
            Err(other) => panic!("unexpected error {other:?} for {rates:?}"),
        }
    }

    /// Equal moderate rates always fit, up to the full 16 channels.
    #[test]
    fn equal_rates_always_schedule(hz in 10_000u32..=1_000_000, n in 1usize..=16) {
        let reqs = requests(&vec![hz; n], 8);
        let schedule = compute_schedule(32_000_000, &reqs, AcquisitionMode::FreeRunning).unwrap();
        assert_invariants(&schedule);
    }

    /// Rounding keeps the achieved rate within a factor of two of the
    /// request for a lone channel.
    #[test]
    fn single_channel_rate_within_octave(hz in 1_000u32..=5_000_000) {
        let reqs = requests(&[hz], 16);
        if let Ok(schedule) = compute_schedule(32_000_000, &reqs, AcquisitionMode::FreeRunning) {
            let achieved = schedule.entries()[0].achieved_rate_hz;
            assert!(achieved <= 2 * hz && achieved * 2 + 1 >= hz / 2,
                "requested {hz} Hz, achieved {achieved} Hz");
        }
    }

    /// Out-of-order rates are rejected up front.
    #[test]
    fn increasing_rates_rejected(slow in 1_000u32..=100_000, extra in 1u32..=100_000) {
        let reqs = requests(&[slow, slow + extra], 4);
        assert_eq!(
            compute_schedule(90_000_000, &reqs, AcquisitionMode::FreeRunning),
            Err(Error::InvalidSamplingRate { channel: 1 })
        );
    }
}

#[test]
fn worked_example_single_channel() {
    let s = compute_schedule(90_000_000, &requests(&[9_000], 16), AcquisitionMode::FreeRunning)
        .unwrap();
    assert_eq!(s.entries()[0].slot_factor, 8_192);
}

#[test]
fn worked_example_two_channels() {
    let s = compute_schedule(
        90_000_000,
        &requests(&[32_000, 9_000], 16),
        AcquisitionMode::FreeRunning,
    )
    .unwrap();
    let factors: Vec<u16> = s.entries().iter().map(|e| e.slot_factor).collect();
    let offsets: Vec<u16> = s.entries().iter().map(|e| e.phase_offset).collect();
    assert_eq!(factors, [2_048, 8_192]);
    assert_eq!(offsets, [0, 1]);
}

#[test]
fn single_sample_primary_runs_four_times_faster() {
    let grouped = compute_schedule(90_000_000, &requests(&[9_000], 16), AcquisitionMode::FreeRunning)
        .unwrap();
    let single = compute_schedule(90_000_000, &requests(&[9_000], 1), AcquisitionMode::FreeRunning)
        .unwrap();
    assert_eq!(
        single.entries()[0].slot_factor * 4,
        grouped.entries()[0].slot_factor
    );
}

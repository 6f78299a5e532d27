//! Rate scheduler: turn per-channel sampling rates into a time-division
//! schedule one converter core can serve.
//!
//! # Slot factors
//!
//! A channel's *slot factor* is the number of base-clock ticks between two of
//! its samples. Factors are derived in cascade, fastest channel first:
//!
//! ```text
//!   sf[0] = max(ceil(base / rate[0]), 2)
//!   sf[i] = sf[i-1] × ceil(rate[i-1] / rate[i])
//! ```
//!
//! and each is snapped to a power of two (closer-half rule) so the phase
//! allocator can pack channels like a buddy allocator. If the channels seen so
//! far would need more than every tick (`Σ 1/sf > 1`), all their factors are
//! doubled until they fit.
//!
//! # Channel ordering contract
//!
//! Requests must be listed with non-increasing rates. The cascade scales the
//! previous factor up by the rate ratio; a faster channel after a slower one
//! would need a ratio below one, which the formula cannot express. Violations
//! are rejected with [`Error::InvalidSamplingRate`] naming the first channel
//! that is faster than its predecessor.
//!
//! # Worked example (90 MHz base clock, one channel at 9 kHz)
//!
//! ```text
//!   ceil(90 000 000 / 9 000) = 10 000
//!   p = 16 384, 10 000 − 8 192 = 1 808 < 4 096  →  8 192
//! ```

use heapless::Vec;

use crate::clock::{self, ClockPlan};
use crate::config::{AcquisitionMode, MAX_CHANNELS};
use crate::error::{Error, Result};
use crate::phase;
use crate::types::{ChannelRequest, SampleCount};

/// Largest factor the 16-bit slot registers hold.
const MAX_SLOT_FACTOR: u32 = u16::MAX as u32;

/// Smallest factor: a channel may not take every tick.
const MIN_SLOT_FACTOR: u32 = 2;

/// One channel's place in the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScheduleEntry {
    /// Base-clock ticks between consecutive samples (≥ 2, power of two).
    pub slot_factor: u16,
    /// Tick of the channel's first slot within a schedule cycle.
    pub phase_offset: u16,
    /// Rate actually delivered: `base_clock_hz / slot_factor`.
    pub achieved_rate_hz: u32,
}

/// Complete schedule of one configuration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Divider settings.
    pub plan: ClockPlan,
    /// Longest hold time required by any enabled channel (ns).
    pub min_hold_ns: u32,
    entries: Vec<ScheduleEntry, MAX_CHANNELS>,
}

impl Schedule {
    /// Per-channel entries, in channel order.
    #[must_use]
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Entry of one channel.
    #[must_use]
    pub fn entry(&self, channel: usize) -> Option<&ScheduleEntry> {
        self.entries.get(channel)
    }

    /// Length of one full schedule cycle in ticks (largest slot factor).
    #[must_use]
    pub fn cycle_ticks(&self) -> u16 {
        self.entries
            .iter()
            .map(|e| e.slot_factor)
            .max()
            .unwrap_or(0)
    }

    /// Sample slots used per cycle, against [`cycle_ticks`](Self::cycle_ticks).
    ///
    /// `utilisation().0 <= utilisation().1` is the no-oversubscription
    /// invariant.
    #[must_use]
    pub fn utilisation(&self) -> (u32, u32) {
        let cycle = u32::from(self.cycle_ticks());
        let used = self
            .entries
            .iter()
            .map(|e| cycle.checked_div(u32::from(e.slot_factor)).unwrap_or(0))
            .fold(0u32, u32::saturating_add);
        (used, cycle)
    }
}

/// Compute factors, phase offsets and the divider plan for `requests`.
///
/// Requests must be ordered fastest first (see the module docs).
///
/// # Errors
///
/// - [`Error::InvalidChannelCount`]: no request, more than 16, or more than
///   one in [`AcquisitionMode::Static`].
/// - [`Error::InvalidSampleCount`]: static mode with more than one sample.
/// - [`Error::InvalidSamplingRate`]: zero base clock, a rate above what the
///   channel's front end allows, rates out of order, or a primary rate so
///   low that its factor cannot fit 16 bits.
/// - [`Error::SchedulingInfeasible`]: cascading or doubling overflowed the
///   slot registers.
pub fn compute_schedule(
    base_clock_hz: u32,
    requests: &[ChannelRequest],
    mode: AcquisitionMode,
) -> Result<Schedule> {
    validate(base_clock_hz, requests, mode)?;

    let factors = slot_factors(base_clock_hz, requests)?;
    let mut narrow: Vec<u16, MAX_CHANNELS> = Vec::new();
    for &f in &factors {
        let f = u16::try_from(f).map_err(|_| Error::SchedulingInfeasible)?;
        narrow.push(f).map_err(|_| Error::SchedulingInfeasible)?;
    }
    let offsets = phase::assign_offsets(&narrow)?;

    let mut entries: Vec<ScheduleEntry, MAX_CHANNELS> = Vec::new();
    for (&slot_factor, &phase_offset) in narrow.iter().zip(offsets.iter()) {
        let entry = ScheduleEntry {
            slot_factor,
            phase_offset,
            achieved_rate_hz: base_clock_hz
                .checked_div(u32::from(slot_factor))
                .unwrap_or(0),
        };
        entries.push(entry).map_err(|_| Error::SchedulingInfeasible)?;
    }

    let min_hold_ns = requests
        .iter()
        .map(|r| clock::min_sample_hold_ns(&r.front_end))
        .max()
        .unwrap_or(clock::ABSOLUTE_MIN_HOLD_NS);
    let static_rate = match mode {
        AcquisitionMode::Static => requests.first().map(|r| r.sampling_rate),
        AcquisitionMode::FreeRunning => None,
    };
    let plan = clock::clock_plan(base_clock_hz, min_hold_ns, static_rate);

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "schedule: {=usize} channels, cycle {=u16} ticks, divider {=u32}/{=u32}",
        entries.len(),
        entries.iter().map(|e| e.slot_factor).max().unwrap_or(0),
        plan.on_cycles,
        plan.total_cycles
    );

    Ok(Schedule {
        plan,
        min_hold_ns,
        entries,
    })
}

#[allow(clippy::cast_possible_truncation)] // Safety: index < MAX_CHANNELS (16)
fn validate(base_clock_hz: u32, requests: &[ChannelRequest], mode: AcquisitionMode) -> Result<()> {
    let count = requests.len();
    if count == 0 || count > MAX_CHANNELS {
        return Err(Error::InvalidChannelCount { count });
    }
    if mode == AcquisitionMode::Static {
        if count != 1 {
            return Err(Error::InvalidChannelCount { count });
        }
        if requests.iter().any(|r| r.num_samples != SampleCount::ONE) {
            return Err(Error::InvalidSampleCount { channel: 0 });
        }
    }
    if base_clock_hz == 0 {
        return Err(Error::InvalidSamplingRate { channel: 0 });
    }

    let mut previous: Option<u32> = None;
    for (index, request) in requests.iter().enumerate() {
        let channel = index as u8;
        let rate = request.sampling_rate.get();
        let limit = clock::achievable_max_rate_hz(clock::min_sample_hold_ns(&request.front_end));
        if rate > limit {
            return Err(Error::InvalidSamplingRate { channel });
        }
        if previous.is_some_and(|prev| rate > prev) {
            return Err(Error::InvalidSamplingRate { channel });
        }
        previous = Some(rate);
    }
    Ok(())
}

/// Cascade, round and de-oversubscribe the slot factors.
#[allow(clippy::cast_possible_truncation)] // Safety: index < MAX_CHANNELS (16)
#[allow(clippy::arithmetic_side_effects)] // Safety: divisions by non-zero validated rates
fn slot_factors(base_clock_hz: u32, requests: &[ChannelRequest]) -> Result<Vec<u32, MAX_CHANNELS>> {
    let mut factors: Vec<u32, MAX_CHANNELS> = Vec::new();
    let mut previous: Option<(u32, u32)> = None; // (factor, rate)

    for (index, request) in requests.iter().enumerate() {
        let channel = index as u8;
        let rate = request.sampling_rate.get();
        // Only the primary channel's factor follows directly from its rate;
        // later overflows come from the cascade.
        let overflow = if index == 0 {
            Error::InvalidSamplingRate { channel }
        } else {
            Error::SchedulingInfeasible
        };
        let raw = match previous {
            None => base_clock_hz.div_ceil(rate).max(MIN_SLOT_FACTOR),
            Some((prev_factor, prev_rate)) => prev_factor
                .checked_mul(prev_rate.div_ceil(rate))
                .ok_or(overflow)?,
        };
        let factor = round_to_power_of_two(raw);
        if factor > MAX_SLOT_FACTOR {
            return Err(overflow);
        }
        factors
            .push(factor)
            .map_err(|_| Error::InvalidChannelCount {
                count: requests.len(),
            })?;
        relieve_oversubscription(&mut factors)?;
        previous = factors.last().map(|&f| (f, rate));
    }

    let single_shot_primary = requests
        .first()
        .is_some_and(|r| r.num_samples == SampleCount::ONE);
    if single_shot_primary {
        if let Some(primary) = factors.first_mut() {
            *primary = (*primary / 4).max(MIN_SLOT_FACTOR);
        }
        relieve_oversubscription(&mut factors)?;
    }

    Ok(factors)
}

/// Snap a factor to a power of two with the closer-half rule.
///
/// `p` is the smallest power of two `>= factor`; the result is `p / 2` when
/// `factor − p/2 < p/4`, else `p`.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // Safety: p >= factor >= p/2 for p = next_power_of_two
pub fn round_to_power_of_two(factor: u32) -> u32 {
    if factor <= MIN_SLOT_FACTOR {
        return MIN_SLOT_FACTOR;
    }
    if factor.is_power_of_two() {
        return factor;
    }
    // Saturate above 2^31: such a factor is far beyond the 16-bit registers.
    let Some(p) = factor.checked_next_power_of_two() else {
        return u32::MAX;
    };
    let lower = p >> 1;
    if factor.saturating_sub(lower) < p >> 2 {
        lower
    } else {
        p
    }
}

/// Double every factor until `Σ 1/sf <= 1`.
///
/// Factors are powers of two, so the sum is exact in units of the largest
/// factor.
fn relieve_oversubscription(factors: &mut [u32]) -> Result<()> {
    while oversubscribed(factors) {
        for factor in factors.iter_mut() {
            *factor = factor
                .checked_mul(2)
                .filter(|&f| f <= MAX_SLOT_FACTOR)
                .ok_or(Error::SchedulingInfeasible)?;
        }
    }
    Ok(())
}

fn oversubscribed(factors: &[u32]) -> bool {
    let Some(&cycle) = factors.iter().max() else {
        return false;
    };
    let used = factors
        .iter()
        .map(|&f| u64::from(cycle.checked_div(f).unwrap_or(0)))
        .fold(0u64, u64::saturating_add);
    used > u64::from(cycle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::types::{FrontEnd, SamplingRateHz};

    fn req(rate: u32, samples: u16) -> ChannelRequest {
        ChannelRequest::new(
            SamplingRateHz::new(rate).unwrap(),
            SampleCount::new(samples).unwrap(),
        )
    }

    const BASE: u32 = 90_000_000;

    #[test]
    fn closer_half_rounding() {
        assert_eq!(round_to_power_of_two(10_000), 8_192);
        assert_eq!(round_to_power_of_two(2_813), 2_048);
        assert_eq!(round_to_power_of_two(3_500), 4_096);
        assert_eq!(round_to_power_of_two(3), 4);
        assert_eq!(round_to_power_of_two(5), 4);
        assert_eq!(round_to_power_of_two(7), 8);
        assert_eq!(round_to_power_of_two(1), 2);
        assert_eq!(round_to_power_of_two(4_096), 4_096);
    }

    #[test]
    fn single_channel_9khz_at_90mhz() {
        let s = compute_schedule(BASE, &[req(9_000, 16)], AcquisitionMode::FreeRunning).unwrap();
        let e = s.entries()[0];
        assert_eq!(e.slot_factor, 8_192);
        assert_eq!(e.phase_offset, 0);
        assert_eq!(e.achieved_rate_hz, 10_986);
    }

    #[test]
    fn two_channels_cascade_from_rounded_primary() {
        let s = compute_schedule(
            BASE,
            &[req(32_000, 16), req(9_000, 16)],
            AcquisitionMode::FreeRunning,
        )
        .unwrap();
        // ceil(90e6 / 32000) = 2813 → 2048; 2048 × ceil(32000 / 9000) = 2048 × 4
        assert_eq!(s.entries()[0].slot_factor, 2_048);
        assert_eq!(s.entries()[1].slot_factor, 8_192);
        assert_eq!(s.entries()[1].phase_offset, 1);
    }

    #[test]
    fn single_sample_primary_is_divided_by_four() {
        let s = compute_schedule(BASE, &[req(9_000, 1)], AcquisitionMode::FreeRunning).unwrap();
        assert_eq!(s.entries()[0].slot_factor, 8_192 / 4);
    }

    #[test]
    fn single_sample_division_keeps_minimum_factor() {
        // ceil(90e6 / 5e6) = 18 → 16, /4 = 4
        let s = compute_schedule(BASE, &[req(5_000_000, 1)], AcquisitionMode::FreeRunning)
            .unwrap();
        assert_eq!(s.entries()[0].slot_factor, 4);

        let s = compute_schedule(10_000_000, &[req(5_000_000, 1)], AcquisitionMode::FreeRunning)
            .unwrap();
        assert_eq!(s.entries()[0].slot_factor, 2);
    }

    #[test]
    fn equal_fast_channels_are_doubled_to_fit() {
        // Each alone would take every 2nd tick; three of them do not fit.
        let reqs = [req(5_000_000, 8), req(5_000_000, 8), req(5_000_000, 8)];
        let s = compute_schedule(10_000_000, &reqs, AcquisitionMode::FreeRunning).unwrap();
        let (used, cycle) = s.utilisation();
        assert!(used <= cycle, "{used} slots in a {cycle}-tick cycle");
        assert!(s.entries().iter().all(|e| e.slot_factor >= 4));
    }

    #[test]
    fn rates_must_be_non_increasing() {
        let err = compute_schedule(
            BASE,
            &[req(9_000, 4), req(32_000, 4)],
            AcquisitionMode::FreeRunning,
        )
        .unwrap_err();
        assert_eq!(err, Error::InvalidSamplingRate { channel: 1 });
    }

    #[test]
    fn channel_count_bounds() {
        assert_eq!(
            compute_schedule(BASE, &[], AcquisitionMode::FreeRunning),
            Err(Error::InvalidChannelCount { count: 0 })
        );
        let many = [req(1_000, 4); 17];
        assert_eq!(
            compute_schedule(BASE, &many, AcquisitionMode::FreeRunning),
            Err(Error::InvalidChannelCount { count: 17 })
        );
    }

    #[test]
    fn static_mode_requires_one_channel_one_sample() {
        assert_eq!(
            compute_schedule(BASE, &[req(9_000, 1), req(9_000, 1)], AcquisitionMode::Static),
            Err(Error::InvalidChannelCount { count: 2 })
        );
        assert_eq!(
            compute_schedule(BASE, &[req(9_000, 4)], AcquisitionMode::Static),
            Err(Error::InvalidSampleCount { channel: 0 })
        );
        let s = compute_schedule(BASE, &[req(9_000, 1)], AcquisitionMode::Static).unwrap();
        assert_eq!(s.plan.total_cycles, 10_000);
    }

    #[test]
    fn rate_above_front_end_limit_is_rejected() {
        let dac_driven = req(1_000_000, 4).with_front_end(FrontEnd {
            opamp_gain: None,
            dac_present: true,
        });
        assert_eq!(
            compute_schedule(BASE, &[dac_driven], AcquisitionMode::FreeRunning),
            Err(Error::InvalidSamplingRate { channel: 0 })
        );
    }

    #[test]
    fn rate_too_low_for_slot_register_is_rejected() {
        // ceil(90e6 / 1000) = 90 000 does not fit 16 bits.
        assert_eq!(
            compute_schedule(BASE, &[req(1_000, 4)], AcquisitionMode::FreeRunning),
            Err(Error::InvalidSamplingRate { channel: 0 })
        );
    }

    #[test]
    fn cascade_overflow_is_infeasible() {
        // 2048 × ceil(32000 / 1000) = 65 536
        assert_eq!(
            compute_schedule(
                BASE,
                &[req(32_000, 4), req(1_000, 4)],
                AcquisitionMode::FreeRunning
            ),
            Err(Error::SchedulingInfeasible)
        );
    }

    #[test]
    fn zero_base_clock_is_rejected() {
        assert_eq!(
            compute_schedule(0, &[req(1_000, 4)], AcquisitionMode::FreeRunning),
            Err(Error::InvalidSamplingRate { channel: 0 })
        );
    }

    #[test]
    fn plan_uses_longest_hold_time() {
        let slow_front_end = req(100_000, 4).with_front_end(FrontEnd {
            opamp_gain: None,
            dac_present: true,
        });
        let s = compute_schedule(
            32_000_000,
            &[req(200_000, 4), slow_front_end],
            AcquisitionMode::FreeRunning,
        )
        .unwrap();
        assert_eq!(s.min_hold_ns, clock::DAC_MIN_HOLD_NS);
        assert_ne!(s.plan.on_cycles, s.plan.total_cycles);
    }
}

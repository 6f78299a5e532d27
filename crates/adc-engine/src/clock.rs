//! Converter clock model: sample-hold time and on/off cycle split.
//!
//! The converter runs from a base clock divided into an "on" (sample-hold)
//! phase and an "off" (conversion) phase:
//!
//! ```text
//!   base clock ──► divider ──► |‾‾‾‾ on_cycles ‾‾‾‾|____ off ____|  = total_cycles
//!                                  input settles       converts
//! ```
//!
//! The on phase must cover the settling time of whatever sits in front of the
//! input. Settling grows with op-amp gain (bandwidth = GBW / gain) and is
//! dominated by the DAC output stage when the DAC drives the pin.
//!
//! # Worked example (90 MHz base clock, bypassed front end)
//!
//! ```text
//!   min_hold     = 100 ns                       (absolute floor)
//!   max_rate     = min(1 / (100 ns + 100 ns), 5 MHz) = 5 MHz
//!   total_cycles = ceil(90 MHz / 5 MHz)         = 18
//!   on_cycles    = ceil(100 ns × 90 MHz)        = 9
//! ```

use crate::types::{FrontEnd, OpampGain, SamplingRateHz};

/// Absolute converter throughput limit (Hz).
pub const ADC_MAX_RATE_HZ: u32 = 5_000_000;

/// Margin kept above the hold time: one tick of the 10 MHz sequencer clock.
pub const SEQUENCER_TICK_NS: u32 = 100;

/// Shortest hold time the sampling switch supports (ns).
pub const ABSOLUTE_MIN_HOLD_NS: u32 = 100;

/// Hold floor when the on-chip DAC drives the input (ns).
pub const DAC_MIN_HOLD_NS: u32 = 3_500;

const NS_PER_S: u64 = 1_000_000_000;

/// Op-amp settling step table: `(lower gain bound in tenths, settling ns)`.
///
/// A gain uses the last row whose bound it reaches; gains below ×2.0 settle
/// inside the absolute floor.
const OPAMP_SETTLING_NS: [(u16, u32); 8] = [
    (20, 160),
    (25, 200),
    (30, 260),
    (40, 360),
    (60, 520),
    (80, 700),
    (120, 1_000),
    (160, 1_400),
];

/// On/off split of one conversion cycle, in base-clock ticks.
///
/// Invariant: `on_cycles != total_cycles`, so the two phases are
/// distinguishable by the divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockPlan {
    /// Ticks spent in sample-hold.
    pub on_cycles: u32,
    /// Ticks per full conversion cycle.
    pub total_cycles: u32,
}

impl ClockPlan {
    /// Conversion rate this plan yields at `base_clock_hz`.
    #[must_use]
    pub fn conversion_rate_hz(&self, base_clock_hz: u32) -> u32 {
        base_clock_hz.checked_div(self.total_cycles).unwrap_or(0)
    }
}

/// Settling time of the op-amp stage at `gain`.
#[must_use]
pub fn opamp_settling_ns(gain: OpampGain) -> u32 {
    OPAMP_SETTLING_NS
        .iter()
        .rev()
        .find(|(bound, _)| gain.tenths() >= *bound)
        .map_or(0, |&(_, ns)| ns)
}

/// Minimum sample-hold time required by a channel's front end.
#[must_use]
pub fn min_sample_hold_ns(front_end: &FrontEnd) -> u32 {
    let opamp = front_end.opamp_gain.map_or(0, opamp_settling_ns);
    let dac = if front_end.dac_present {
        DAC_MIN_HOLD_NS
    } else {
        0
    };
    opamp.max(dac).max(ABSOLUTE_MIN_HOLD_NS)
}

/// Highest rate a channel with `min_hold_ns` can be sampled at.
///
/// `min(1 / (min_hold + 100 ns), 5 MHz)`.
#[must_use]
pub fn achievable_max_rate_hz(min_hold_ns: u32) -> u32 {
    let period_ns = u64::from(min_hold_ns.saturating_add(SEQUENCER_TICK_NS));
    let rate = NS_PER_S.checked_div(period_ns).unwrap_or(0);
    u32::try_from(rate)
        .unwrap_or(ADC_MAX_RATE_HZ)
        .min(ADC_MAX_RATE_HZ)
}

/// Derive the divider settings for `base_clock_hz`.
///
/// `static_rate` is the literal request of a one-shot acquisition; when its
/// cycle count is longer than the derived cycle, it wins.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // Safety: u64 products of two u32 values cannot overflow
pub fn clock_plan(
    base_clock_hz: u32,
    min_hold_ns: u32,
    static_rate: Option<SamplingRateHz>,
) -> ClockPlan {
    let base = u64::from(base_clock_hz);
    let max_rate = u64::from(achievable_max_rate_hz(min_hold_ns)).max(1);

    let mut total = base.div_ceil(max_rate);
    let on = (u64::from(min_hold_ns) * base).div_ceil(NS_PER_S);
    if total == on {
        total += 1;
    }
    if let Some(rate) = static_rate {
        total = total.max(base.div_ceil(u64::from(rate.get())));
    }

    ClockPlan {
        on_cycles: saturate_u32(on),
        total_cycles: saturate_u32(total),
    }
}

fn saturate_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

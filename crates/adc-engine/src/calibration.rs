//! Trim-based offset/gain calibration of raw conversion words.
//!
//! Factory trim holds one offset/gain pair per input mode. The pair is read
//! once when the pipeline is configured and applied to every sample:
//!
//! ```text
//!   raw & 0xFFF ─► flip bit 11 ─► − offset ─► × gain ─► clamp 0..=4095 ─► re-center
//! ```
//!
//! The converter stores the sign of its two's-complement result inverted in
//! bit 11, hence the flip on the way in and the re-center on the way out.
//! With offset 0 and gain 1.000 the chain is the identity on 12-bit values.

use embedded_hal::delay::DelayNs;

use crate::config::TRIM_POLL_INTERVAL_US;
use crate::error::{Error, Result};
use crate::hardware::TrimSource;
use crate::types::InputMode;

const SAMPLE_MASK: u16 = 0x0FFF;
const SIGN_BIT: u16 = 0x0800;
const FULL_SCALE: i64 = 4095;
const MID_SCALE: i64 = 2048;
const MILLI: i64 = 1000;

/// Flip the inverted sign bit of a 12-bit conversion word.
///
/// Involution: `flip_sign_bit(flip_sign_bit(x)) == x`.
#[must_use]
pub const fn flip_sign_bit(raw: u16) -> u16 {
    raw ^ SIGN_BIT
}

/// Fixed-point gain: `integer + fraction_milli / 1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixedGain {
    /// Whole part.
    pub integer: u16,
    /// Fractional part in thousandths.
    pub fraction_milli: u16,
}

impl FixedGain {
    /// Gain of exactly 1.000.
    pub const UNITY: Self = Self {
        integer: 1,
        fraction_milli: 0,
    };

    /// Decode the packed trim layout: integer in bits 14 and up, thousandths
    /// in bits 0..14.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Safety: both fields masked/shifted into u16 range
    pub const fn from_packed(raw: u32) -> Self {
        Self {
            integer: ((raw >> 14) & 0xFFFF) as u16,
            fraction_milli: (raw & 0x3FFF) as u16,
        }
    }

    /// Gain in thousandths.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: u16 × 1000 + u16 fits i64
    pub fn as_milli(self) -> i64 {
        i64::from(self.integer) * MILLI + i64::from(self.fraction_milli)
    }
}

/// Offset/gain pair of one input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeCalibration {
    /// Offset subtracted before gain, in LSB.
    pub offset: u16,
    /// Multiplicative gain.
    pub gain: FixedGain,
}

impl ModeCalibration {
    /// No offset, unity gain.
    pub const IDENTITY: Self = Self {
        offset: 0,
        gain: FixedGain::UNITY,
    };

    /// Calibrate one raw conversion word.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: 13-bit × 30-bit product fits i64; clamped before narrowing
    #[allow(clippy::cast_possible_truncation)] // Safety: value clamped to 0..=4095
    pub fn apply(&self, raw: u16) -> i16 {
        let flipped = i64::from(flip_sign_bit(raw & SAMPLE_MASK));
        let scaled = (flipped - i64::from(self.offset)) * self.gain.as_milli() / MILLI;
        let clamped = scaled.clamp(0, FULL_SCALE);
        let centred = if clamped >= MID_SCALE {
            clamped - MID_SCALE
        } else {
            clamped + MID_SCALE
        };
        centred as i16
    }
}

/// Calibration of both input modes, fixed for a configuration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationParams {
    /// Single-ended pair.
    pub single: ModeCalibration,
    /// Differential pair.
    pub differential: ModeCalibration,
}

impl CalibrationParams {
    /// Pass-through: every 12-bit raw value maps to itself.
    pub const IDENTITY: Self = Self {
        single: ModeCalibration::IDENTITY,
        differential: ModeCalibration::IDENTITY,
    };

    /// Pair used for `mode`.
    #[must_use]
    pub const fn for_mode(&self, mode: InputMode) -> &ModeCalibration {
        match mode {
            InputMode::SingleEnded => &self.single,
            InputMode::Differential => &self.differential,
        }
    }

    /// Calibrate one raw conversion word taken in `mode`.
    #[must_use]
    pub fn apply(&self, raw: u16, mode: InputMode) -> i16 {
        self.for_mode(mode).apply(raw)
    }
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Loader for factory trim.
pub struct CalibrationModel;

impl CalibrationModel {
    /// Wait for trim storage, then read both mode pairs.
    ///
    /// Polls [`TrimSource::is_ready`] every
    /// [`TRIM_POLL_INTERVAL_US`](crate::config::TRIM_POLL_INTERVAL_US) and
    /// gives up once `timeout_us` has elapsed. A zero timeout still checks
    /// readiness once.
    ///
    /// # Errors
    ///
    /// [`Error::CalibrationTimeout`] if the storage never becomes ready.
    pub fn load<T, D>(trim: &mut T, delay: &mut D, timeout_us: u32) -> Result<CalibrationParams>
    where
        T: TrimSource + ?Sized,
        D: DelayNs + ?Sized,
    {
        let mut waited_us: u32 = 0;
        while !trim.is_ready() {
            if waited_us >= timeout_us {
                #[cfg(feature = "defmt")]
                defmt::warn!("trim storage not ready after {=u32} us", waited_us);
                return Err(Error::CalibrationTimeout);
            }
            delay.delay_us(TRIM_POLL_INTERVAL_US);
            waited_us = waited_us.saturating_add(TRIM_POLL_INTERVAL_US);
        }

        let read = |trim: &mut T, mode| ModeCalibration {
            offset: trim.read_offset(mode),
            gain: FixedGain::from_packed(trim.read_gain(mode)),
        };
        let params = CalibrationParams {
            single: read(trim, InputMode::SingleEnded),
            differential: read(trim, InputMode::Differential),
        };

        #[cfg(feature = "defmt")]
        defmt::debug!("trim loaded: {}", params);

        Ok(params)
    }
}

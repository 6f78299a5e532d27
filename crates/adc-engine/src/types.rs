//! Validated newtypes for channel requests.
//!
//! These zero-cost wrappers keep out-of-range values away from the scheduler:
//! - `SamplingRateHz`: 1 Hz – 5 MHz (absolute ADC throughput limit)
//! - `SampleCount`: 1 – 1023 samples per group (10-bit group counter)
//! - `ChannelId`: 0 – 15
//! - `OpampGain`: analog front-end gain in tenths, 1.0 – 64.0

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

impl OutOfRangeError {
    const fn check(value: u32, min: u32, max: u32) -> Result<u32, Self> {
        if value < min || value > max {
            Err(Self { value, min, max })
        } else {
            Ok(value)
        }
    }
}

// ── SamplingRateHz ───────────────────────────────────────────────────────────

/// Requested sampling rate of one channel, in Hz.
///
/// Zero is unrepresentable. The upper bound is the converter's absolute
/// throughput; the analog front-end of a channel may lower the usable maximum
/// further (see [`crate::clock::achievable_max_rate_hz`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SamplingRateHz(u32);

impl SamplingRateHz {
    /// Minimum sampling rate: 1 Hz.
    pub const MIN_HZ: u32 = 1;

    /// Maximum sampling rate: 5 MHz.
    pub const MAX_HZ: u32 = 5_000_000;

    /// Create a `SamplingRateHz`, returning an error outside 1 Hz – 5 MHz.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz == 0` or `hz > 5_000_000`.
    pub const fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        match OutOfRangeError::check(hz, Self::MIN_HZ, Self::MAX_HZ) {
            Ok(hz) => Ok(Self(hz)),
            Err(e) => Err(e),
        }
    }

    /// Return the rate in Hz.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

// ── SampleCount ──────────────────────────────────────────────────────────────

/// Number of samples in one delivered group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleCount(u16);

impl SampleCount {
    /// Smallest group: a single sample.
    pub const MIN: u16 = 1;

    /// Largest group the hardware group counter can express.
    pub const MAX: u16 = 1023;

    /// One sample, as used by static (one-shot) acquisition.
    pub const ONE: Self = Self(1);

    /// Create a `SampleCount`, returning an error outside 1 – 1023.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `count == 0` or `count > 1023`.
    pub fn new(count: u16) -> Result<Self, OutOfRangeError> {
        OutOfRangeError::check(u32::from(count), u32::from(Self::MIN), u32::from(Self::MAX))
            .map(|_| Self(count))
    }

    /// Return the count.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Return the count as a buffer length.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0 as usize
    }

    /// Always false: a group holds at least one sample.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }
}

// ── ChannelId ────────────────────────────────────────────────────────────────

/// Index of an enabled channel, 0 – 15.
///
/// Channel identity is the position of the request in the configuration list.
/// In the shared-ring layout the same value travels in the top nibble of every
/// sample word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Highest channel index.
    pub const MAX: u8 = 15;

    /// Create a `ChannelId`, rejecting indices above 15.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `id > 15`.
    pub fn new(id: u8) -> Result<Self, OutOfRangeError> {
        OutOfRangeError::check(u32::from(id), 0, u32::from(Self::MAX)).map(|_| Self(id))
    }

    /// Build from a table index already known to be below `MAX_CHANNELS`.
    #[allow(clippy::cast_possible_truncation)] // index < MAX_CHANNELS (16) by caller contract
    pub(crate) const fn from_index(index: usize) -> Self {
        Self((index & 0x0F) as u8)
    }

    /// Return the raw channel number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Return the channel number as a table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit of this channel in the 16-bit interrupt status word.
    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self.0
    }
}

// ── OpampGain ────────────────────────────────────────────────────────────────

/// Gain of the op-amp in front of a channel, in tenths (20 = ×2.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct OpampGain(u16);

impl OpampGain {
    /// Unity gain (×1.0).
    pub const UNITY: Self = Self(10);

    /// Minimum gain in tenths (×1.0).
    pub const MIN_TENTHS: u16 = 10;

    /// Maximum gain in tenths (×64.0).
    pub const MAX_TENTHS: u16 = 640;

    /// Create an `OpampGain` from tenths.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] outside ×1.0 – ×64.0.
    pub fn from_tenths(tenths: u16) -> Result<Self, OutOfRangeError> {
        OutOfRangeError::check(
            u32::from(tenths),
            u32::from(Self::MIN_TENTHS),
            u32::from(Self::MAX_TENTHS),
        )
        .map(|_| Self(tenths))
    }

    /// Return the gain in tenths.
    #[must_use]
    pub const fn tenths(self) -> u16 {
        self.0
    }
}

// ── Channel request ──────────────────────────────────────────────────────────

/// How the channel's input pins are sampled. Selects the calibration pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputMode {
    /// Positive input against ground.
    #[default]
    SingleEnded,
    /// Positive input against negative input.
    Differential,
}

/// Analog path in front of the converter. Determines settling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrontEnd {
    /// Op-amp gain, or `None` when the op-amp is bypassed.
    pub opamp_gain: Option<OpampGain>,
    /// The on-chip DAC drives this input (needs the long settling floor).
    pub dac_present: bool,
}

/// One channel's acquisition request. Immutable for a configuration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRequest {
    /// Requested sampling rate.
    pub sampling_rate: SamplingRateHz,
    /// Samples per delivered group.
    pub num_samples: SampleCount,
    /// Single-ended or differential input.
    pub input: InputMode,
    /// Analog front-end settling factors.
    pub front_end: FrontEnd,
}

impl ChannelRequest {
    /// Single-ended request with a bypassed front end.
    #[must_use]
    pub const fn new(sampling_rate: SamplingRateHz, num_samples: SampleCount) -> Self {
        Self {
            sampling_rate,
            num_samples,
            input: InputMode::SingleEnded,
            front_end: FrontEnd {
                opamp_gain: None,
                dac_present: false,
            },
        }
    }

    /// Same request with a different input mode.
    #[must_use]
    pub const fn with_input(mut self, input: InputMode) -> Self {
        self.input = input;
        self
    }

    /// Same request with a different analog front end.
    #[must_use]
    pub const fn with_front_end(mut self, front_end: FrontEnd) -> Self {
        self.front_end = front_end;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sampling_rate_rejects_zero() {
        let err = SamplingRateHz::new(0).unwrap_err();
        assert_eq!(err.min, 1);
        assert_eq!(err.value, 0);
    }

    #[test]
    fn sampling_rate_accepts_device_maximum() {
        assert_eq!(SamplingRateHz::new(5_000_000).unwrap().get(), 5_000_000);
        assert!(SamplingRateHz::new(5_000_001).is_err());
    }

    #[test]
    fn sample_count_bounds() {
        assert!(SampleCount::new(0).is_err());
        assert_eq!(SampleCount::new(1).unwrap(), SampleCount::ONE);
        assert_eq!(SampleCount::new(1023).unwrap().len(), 1023);
        assert!(SampleCount::new(1024).is_err());
    }

    #[test]
    fn channel_id_mask_matches_status_bit() {
        assert_eq!(ChannelId::new(0).unwrap().mask(), 0x0001);
        assert_eq!(ChannelId::new(15).unwrap().mask(), 0x8000);
        assert!(ChannelId::new(16).is_err());
    }

    #[test]
    fn opamp_gain_range() {
        assert!(OpampGain::from_tenths(9).is_err());
        assert_eq!(OpampGain::from_tenths(25).unwrap().tenths(), 25);
        assert!(OpampGain::from_tenths(641).is_err());
    }

    #[test]
    fn request_builder_keeps_rate_and_count() {
        let req = ChannelRequest::new(
            SamplingRateHz::new(9_000).unwrap(),
            SampleCount::new(10).unwrap(),
        )
        .with_input(InputMode::Differential);
        assert_eq!(req.sampling_rate.get(), 9_000);
        assert_eq!(req.num_samples.get(), 10);
        assert_eq!(req.input, InputMode::Differential);
        assert!(!req.front_end.dac_present);
    }
}

//! Acquisition configuration and engine-wide constants.
//!
//! Every constant shared across modules lives here rather than being
//! hard-coded at the use site.

use crate::error::{Error, Result};

/// Channels the converter can multiplex.
pub const MAX_CHANNELS: usize = 16;

/// Samples processed per chunk inside the interrupt handler.
///
/// Keeps the ISR stack footprint at 64 bytes per chunk regardless of the
/// half-buffer length.
pub const ISR_CHUNK_SAMPLES: usize = 32;

/// Default trim polling budget for [`crate::calibration::CalibrationModel::load`].
pub const DEFAULT_TRIM_TIMEOUT_US: u32 = 10_000;

/// Interval between two trim-ready polls.
pub const TRIM_POLL_INTERVAL_US: u32 = 10;

/// One-shot versus continuous acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionMode {
    /// One channel, one sample per trigger. The divider honours the literal
    /// requested rate instead of the derived schedule.
    Static,
    /// Schedule-driven streaming into ping-pong buffers.
    #[default]
    FreeRunning,
}

/// Session-wide settings passed to
/// [`AcquisitionPipeline::configure`](crate::pipeline::AcquisitionPipeline::configure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    /// Converter base clock feeding the on/off divider (Hz).
    pub base_clock_hz: u32,
    /// Static or free-running.
    pub mode: AcquisitionMode,
    /// Restart a channel's group automatically once it is delivered.
    ///
    /// When `false` the group stays full and later samples are dropped with a
    /// `BufferFull` event until the pipeline is restarted.
    pub auto_reset: bool,
    /// Apply trim calibration to every sample. When `false` samples are only
    /// masked to 12 bits.
    pub calibrate: bool,
}

impl AcquisitionConfig {
    /// 32 MHz ULP reference clock, continuous, calibrated.
    pub const ULP_32MHZ: Self = Self {
        base_clock_hz: 32_000_000,
        mode: AcquisitionMode::FreeRunning,
        auto_reset: true,
        calibrate: true,
    };

    /// 90 MHz high-speed clock, continuous, calibrated.
    pub const HIGH_SPEED_90MHZ: Self = Self {
        base_clock_hz: 90_000_000,
        mode: AcquisitionMode::FreeRunning,
        auto_reset: true,
        calibrate: true,
    };

    /// Single-sample one-shot on the ULP clock.
    pub const ONE_SHOT: Self = Self {
        base_clock_hz: 32_000_000,
        mode: AcquisitionMode::Static,
        auto_reset: false,
        calibrate: true,
    };

    /// Check session-wide settings.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSamplingRate`] when the base clock is zero (no rate
    /// can be derived from it).
    pub fn validate(&self) -> Result<()> {
        if self.base_clock_hz == 0 {
            return Err(Error::InvalidSamplingRate { channel: 0 });
        }
        Ok(())
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::ULP_32MHZ
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for config in [
            AcquisitionConfig::ULP_32MHZ,
            AcquisitionConfig::HIGH_SPEED_90MHZ,
            AcquisitionConfig::ONE_SHOT,
        ] {
            assert_eq!(config.validate(), Ok(()));
        }
    }

    #[test]
    fn zero_base_clock_is_rejected() {
        let config = AcquisitionConfig {
            base_clock_hz: 0,
            ..AcquisitionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::InvalidSamplingRate { channel: 0 })
        );
    }

    #[test]
    fn one_shot_preset_is_static() {
        assert_eq!(AcquisitionConfig::ONE_SHOT.mode, AcquisitionMode::Static);
        assert!(!AcquisitionConfig::ONE_SHOT.auto_reset);
    }
}

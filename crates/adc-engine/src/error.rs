//! Error taxonomy of the acquisition engine.
//!
//! Configuration errors are returned synchronously, before any register is
//! written. Runtime transfer faults never surface here from the interrupt
//! path; they reach the application as [`AcquisitionEvent::TransferError`]
//! and the pipeline keeps running.
//!
//! [`AcquisitionEvent::TransferError`]: crate::pipeline::AcquisitionEvent::TransferError

use crate::hardware::TransferFault;
use crate::pipeline::PipelineState;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors reported by scheduling, calibration and the acquisition pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Rate is above what the channel's front end allows, the rates are not
    /// listed fastest first, the base clock is zero, or the rate is so low
    /// that its slot factor overflows the 16-bit slot register.
    #[error("invalid sampling rate on channel {channel}")]
    InvalidSamplingRate {
        /// Offending channel index.
        channel: u8,
    },

    /// Receive buffer shorter than the group, or static mode with more than
    /// one sample.
    #[error("invalid sample count on channel {channel}")]
    InvalidSampleCount {
        /// Offending channel index.
        channel: u8,
    },

    /// Channel count outside 1–16, or not matching the buffer layout.
    #[error("invalid channel count {count}")]
    InvalidChannelCount {
        /// Number of channels supplied.
        count: usize,
    },

    /// Ping and pong halves start at the same address or overlap.
    #[error("ping and pong buffers collide on channel {channel}")]
    PingPongAddressCollision {
        /// Offending channel index.
        channel: u8,
    },

    /// Buffer outside the converter's sample RAM, misaligned, or with a
    /// length the descriptor cannot hold.
    #[error("buffer address {addr:#010x} out of range")]
    AddressOutOfRange {
        /// First offending address.
        addr: u32,
    },

    /// Trim storage never reported ready within the polling budget.
    #[error("calibration trim read timed out")]
    CalibrationTimeout,

    /// The transfer service refused a request.
    #[error("transfer service error: {0}")]
    TransferError(TransferFault),

    /// No collision-free schedule fits the slot registers.
    #[error("no feasible schedule")]
    SchedulingInfeasible,

    /// Operation not permitted in the current pipeline state.
    #[error("operation not allowed while {state}")]
    InvalidState {
        /// State the pipeline was in.
        state: PipelineState,
    },
}

impl From<TransferFault> for Error {
    fn from(fault: TransferFault) -> Self {
        Self::TransferError(fault)
    }
}

//! Acquisition engine for a multi-channel, time-multiplexed MCU ADC
//!
//! One converter core serves up to 16 channels by time division. This crate
//! turns per-channel rate requests into a conflict-free schedule, streams
//! samples through ping-pong buffers and calibrates them with factory trim,
//! without touching any register itself.
//!
//! # Architecture
//!
//! ```text
//! configure() ─► RateScheduler ─► PhaseAllocator ─► program descriptors
//!                (schedule)       (phase)               │
//!                    │                                  ▼
//!                ClockModel                start() ─► interrupts
//!                (clock)                               │
//!                                     CalibrationModel ─► AcquisitionClient
//! ```
//!
//! - [`schedule`] - slot factors and divider plan
//! - [`phase`] - collision-free phase offsets
//! - [`clock`] - sample-hold time and on/off split
//! - [`calibration`] - trim loading and per-sample correction
//! - [`pipeline`] - state machine and interrupt path
//! - [`hardware`] - collaborator traits and chip families
//!
//! # Features
//!
//! - `defmt`: `defmt::Format` on public types and lifecycle logging
//! - `mocks`: test doubles for every collaborator trait (`adc_engine::mocks`)
//!
//! # Example
//!
//! ```no_run
//! use adc_engine::{
//!     AcquisitionConfig, AcquisitionPipeline, BufferLayout, ChannelRequest, ChannelSetup,
//!     ChipFamily, Error, HardwareOps, PingPongRegion, SampleCount, SamplingRateHz,
//!     TransferService,
//! };
//!
//! fn run<H: HardwareOps, T: TransferService>(hw: H, dma: T) -> adc_engine::Result<()> {
//!     let mut rx = [0i16; 16];
//!     let rate = SamplingRateHz::new(9_000)
//!         .map_err(|_| Error::InvalidSamplingRate { channel: 0 })?;
//!     let count = SampleCount::new(16).map_err(|_| Error::InvalidSampleCount { channel: 0 })?;
//!
//!     let channels: heapless::Vec<_, 16> = core::iter::once(ChannelSetup {
//!         request: ChannelRequest::new(rate, count),
//!         receive: &mut rx,
//!     })
//!     .collect();
//!     let regions = heapless::Vec::from_slice(&[PingPongRegion::contiguous(0x2000_0000, 8)])
//!         .map_err(|_| Error::InvalidChannelCount { count: 1 })?;
//!
//!     let mut adc = AcquisitionPipeline::new(hw, dma, ChipFamily::Gen1);
//!     adc.configure(AcquisitionConfig::HIGH_SPEED_90MHZ, channels, BufferLayout::PerChannel(regions))?;
//!     adc.start()
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // callers decide whether to use accessors
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::new_without_default)]

pub mod buffer;
pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod hardware;
pub mod mocks;
pub mod phase;
pub mod pipeline;
pub mod schedule;
pub mod types;

pub use buffer::{BufferDescriptor, PingPongRegion};
pub use calibration::{CalibrationModel, CalibrationParams, FixedGain, ModeCalibration};
pub use clock::ClockPlan;
pub use config::{AcquisitionConfig, AcquisitionMode, MAX_CHANNELS};
pub use error::{Error, Result};
pub use hardware::{
    ChipFamily, Half, HardwareOps, HardwareProfile, TransferFault, TransferHandle,
    TransferService, TrimSource,
};
pub use pipeline::{
    AcquisitionClient, AcquisitionEvent, AcquisitionPipeline, BufferLayout, ChannelSetup,
    IsrToken, PipelineState,
};
pub use schedule::{compute_schedule, Schedule, ScheduleEntry};
pub use types::{
    ChannelId, ChannelRequest, FrontEnd, InputMode, OpampGain, OutOfRangeError, SampleCount,
    SamplingRateHz,
};

//! Acquisition pipeline: configuration state machine and interrupt-driven
//! swap-and-deliver.
//!
//! # Lifecycle
//!
//! ```text
//!            configure()          start()
//!   Idle ─────────────────► Configured ─────────► Running
//!    ▲  ◄── deinit() ──────┘    ▲ configure()        │
//!    └──────────────────────────┴──── stop() ◄───────┘
//! ```
//!
//! Configuration validates everything before the first register write, so a
//! rejected [`configure`](AcquisitionPipeline::configure) leaves the pipeline
//! exactly as it was.
//!
//! # Interrupt path
//!
//! Each half-full interrupt is handled in two passes:
//!
//! 1. every signalling channel gets its flag cleared, its halves swapped and
//!    the just-filled half re-armed, so hardware always has a free half;
//! 2. the filled halves are read in chunks of
//!    [`ISR_CHUNK_SAMPLES`](crate::config::ISR_CHUNK_SAMPLES), calibrated and
//!    copied into the channel's receive buffer at its fill counter.
//!
//! Completed groups and partial progress are reported to an
//! [`AcquisitionClient`].
//!
//! # Interrupt context
//!
//! There is no lock. Reconfiguration is refused while `Running`, and the
//! interrupt entry points require an [`IsrToken`], which can only be created
//! in `unsafe` code by the interrupt handler.

use core::fmt;

use heapless::Vec;

use crate::buffer::{BufferDescriptor, PingPongRegion, SAMPLE_BYTES};
use crate::calibration::{CalibrationModel, CalibrationParams};
use crate::config::{AcquisitionConfig, ISR_CHUNK_SAMPLES, MAX_CHANNELS};
use crate::error::{Error, Result};
use crate::hardware::{
    ChipFamily, Half, HardwareOps, HardwareProfile, TransferFault, TransferHandle,
    TransferService, TrimSource,
};
use crate::schedule::{compute_schedule, Schedule};
use crate::types::{ChannelId, ChannelRequest};

// ── State and events ─────────────────────────────────────────────────────────

/// Pipeline lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineState {
    /// Nothing programmed, or stopped.
    #[default]
    Idle,
    /// Schedule and descriptors programmed; sampling clock off.
    Configured,
    /// Sampling; interrupts are live.
    Running,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Configured => "configured",
            Self::Running => "running",
        })
    }
}

/// Notification delivered to the application from interrupt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionEvent {
    /// New samples landed; the slice holds the partial group so far.
    DataReady,
    /// The group is complete; the slice holds all `num_samples` samples.
    SampleGroupComplete,
    /// Group full with auto-reset disabled; samples were dropped.
    BufferFull,
    /// The transfer engine reported a fault. The slice is empty.
    TransferError(TransferFault),
}

/// Receiver of acquisition events.
///
/// Called from interrupt context: keep it short.
pub trait AcquisitionClient {
    /// Handle one event for `channel`.
    fn on_event(&mut self, channel: ChannelId, event: AcquisitionEvent, samples: &[i16]);
}

impl<F> AcquisitionClient for F
where
    F: FnMut(ChannelId, AcquisitionEvent, &[i16]),
{
    fn on_event(&mut self, channel: ChannelId, event: AcquisitionEvent, samples: &[i16]) {
        self(channel, event, samples);
    }
}

/// Proof of running inside the ADC or transfer interrupt handler.
///
/// Zero-sized. Only the interrupt handler may create one, which keeps the
/// per-channel runtime table out of reach of thread-mode code.
#[derive(Debug)]
pub struct IsrToken {
    _private: (),
}

impl IsrToken {
    /// Create a token.
    ///
    /// # Safety
    ///
    /// Call only from the ADC or transfer interrupt handler, and only one
    /// handler touching the same pipeline at a time.
    #[must_use]
    pub const unsafe fn assume_interrupt_context() -> Self {
        Self { _private: () }
    }
}

// ── Configuration inputs ─────────────────────────────────────────────────────

/// One channel to configure: what to sample and where to put the groups.
#[derive(Debug)]
pub struct ChannelSetup<'buf> {
    /// Rate, group size, input mode and front end.
    pub request: ChannelRequest,
    /// Destination of calibrated samples; at least `num_samples` long.
    pub receive: &'buf mut [i16],
}

/// Where hardware writes raw samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferLayout {
    /// One ping-pong pair per channel, filled by the converter directly.
    /// Listed in channel order.
    PerChannel(Vec<PingPongRegion, MAX_CHANNELS>),
    /// One ring fed from the shared FIFO by the transfer engine; every word
    /// carries its channel id.
    Shared(PingPongRegion),
}

// ── Runtime table ────────────────────────────────────────────────────────────

/// What happened to one channel during the current interrupt.
#[derive(Debug, Clone, Copy, Default)]
struct Batch {
    stored: u16,
    dropped: u16,
    completed: bool,
}

#[derive(Debug)]
struct ChannelRuntime<'buf> {
    request: ChannelRequest,
    receive: &'buf mut [i16],
    descriptor: Option<BufferDescriptor>,
    fill: u16,
    full: bool,
    batch: Batch,
}

impl ChannelRuntime<'_> {
    fn reset(&mut self) {
        self.fill = 0;
        self.full = false;
        self.batch = Batch::default();
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.active_half = Half::Ping;
        }
    }

    fn begin(&mut self) {
        self.batch = Batch::default();
    }

    fn push<C>(&mut self, id: ChannelId, value: i16, auto_reset: bool, client: &mut C)
    where
        C: AcquisitionClient + ?Sized,
    {
        if self.full {
            self.batch.dropped = self.batch.dropped.saturating_add(1);
            return;
        }
        if let Some(slot) = self.receive.get_mut(usize::from(self.fill)) {
            *slot = value;
        }
        self.fill = self.fill.saturating_add(1);
        self.batch.stored = self.batch.stored.saturating_add(1);

        let group_len = self.request.num_samples;
        if self.fill >= group_len.get() {
            let group = self.receive.get(..group_len.len()).unwrap_or_default();
            client.on_event(id, AcquisitionEvent::SampleGroupComplete, group);
            self.batch.completed = true;
            if auto_reset {
                self.fill = 0;
            } else {
                self.full = true;
            }
        }
    }

    fn finish<C>(&mut self, id: ChannelId, client: &mut C)
    where
        C: AcquisitionClient + ?Sized,
    {
        let batch = self.batch;
        // Samples past a completed group, in this interrupt or a later one.
        if batch.dropped > 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("channel {=u8}: group full, {=u16} samples dropped", id.get(), batch.dropped);
            client.on_event(id, AcquisitionEvent::BufferFull, &[]);
        } else if !batch.completed && batch.stored > 0 {
            let partial = self.receive.get(..usize::from(self.fill)).unwrap_or_default();
            client.on_event(id, AcquisitionEvent::DataReady, partial);
        }
    }
}

#[derive(Debug)]
struct SharedRing {
    descriptor: BufferDescriptor,
    handle: Option<TransferHandle>,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Multi-channel acquisition engine driving one converter.
///
/// Owns its collaborators: `H` programs the converter, `T` runs the shared
/// FIFO transfers. `'buf` is the lifetime of the caller's receive buffers.
pub struct AcquisitionPipeline<'buf, H, T> {
    hw: H,
    transfer: T,
    profile: HardwareProfile,
    state: PipelineState,
    config: AcquisitionConfig,
    calibration: CalibrationParams,
    schedule: Option<Schedule>,
    channels: Vec<ChannelRuntime<'buf>, MAX_CHANNELS>,
    shared: Option<SharedRing>,
}

impl<'buf, H, T> AcquisitionPipeline<'buf, H, T>
where
    H: HardwareOps,
    T: TransferService,
{
    /// Blank pipeline for a chip of `family`, identity calibration.
    pub fn new(hw: H, transfer: T, family: ChipFamily) -> Self {
        Self {
            hw,
            transfer,
            profile: family.profile(),
            state: PipelineState::Idle,
            config: AcquisitionConfig::default(),
            calibration: CalibrationParams::IDENTITY,
            schedule: None,
            channels: Vec::new(),
            shared: None,
        }
    }

    /// Read factory trim and use it for every later sample.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] while running, [`Error::CalibrationTimeout`]
    /// if the trim storage never becomes ready. The previous calibration is
    /// kept on error.
    pub fn load_calibration<R, D>(&mut self, trim: &mut R, delay: &mut D, timeout_us: u32) -> Result<()>
    where
        R: TrimSource + ?Sized,
        D: embedded_hal::delay::DelayNs + ?Sized,
    {
        self.require_not_running()?;
        self.calibration = CalibrationModel::load(trim, delay, timeout_us)?;
        Ok(())
    }

    /// Validate the request set, compute the schedule and program the
    /// converter.
    ///
    /// Channel `i` of `channels` becomes hardware channel `i`; list channels
    /// fastest first (see [`crate::schedule`]).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] while running.
    /// - Any scheduling error of [`compute_schedule`].
    /// - [`Error::InvalidSampleCount`]: a receive buffer shorter than its
    ///   group.
    /// - [`Error::InvalidChannelCount`]: per-channel layout with a different
    ///   number of regions than channels.
    /// - [`Error::PingPongAddressCollision`], [`Error::AddressOutOfRange`]:
    ///   see [`PingPongRegion::validate`].
    ///
    /// Nothing is written to hardware and the state is unchanged on error.
    #[allow(clippy::cast_possible_truncation)] // Safety: index < MAX_CHANNELS (16)
    pub fn configure(
        &mut self,
        config: AcquisitionConfig,
        channels: Vec<ChannelSetup<'buf>, MAX_CHANNELS>,
        layout: BufferLayout,
    ) -> Result<()> {
        self.require_not_running()?;
        config.validate()?;

        let mut requests: Vec<ChannelRequest, MAX_CHANNELS> = Vec::new();
        for setup in &channels {
            requests
                .push(setup.request)
                .map_err(|_| Error::InvalidChannelCount {
                    count: channels.len(),
                })?;
        }
        let schedule = compute_schedule(config.base_clock_hz, &requests, config.mode)?;

        for (index, setup) in channels.iter().enumerate() {
            if setup.receive.len() < setup.request.num_samples.len() {
                return Err(Error::InvalidSampleCount {
                    channel: index as u8,
                });
            }
        }

        match &layout {
            BufferLayout::PerChannel(regions) => {
                if regions.len() != channels.len() {
                    return Err(Error::InvalidChannelCount {
                        count: regions.len(),
                    });
                }
                for (index, region) in regions.iter().enumerate() {
                    region.validate(&self.profile, index as u8)?;
                }
            }
            BufferLayout::Shared(region) => region.validate(&self.profile, 0)?,
        }

        // Validated: from here on only register writes.
        self.hw
            .set_clock_divider(schedule.plan.on_cycles, schedule.plan.total_cycles);
        for (index, entry) in schedule.entries().iter().enumerate() {
            self.hw.program_schedule(
                ChannelId::from_index(index),
                entry.slot_factor,
                entry.phase_offset,
            );
        }

        let mut table: Vec<ChannelRuntime<'buf>, MAX_CHANNELS> = Vec::new();
        for (index, setup) in channels.into_iter().enumerate() {
            let descriptor = match &layout {
                BufferLayout::PerChannel(regions) => regions.get(index).map(|&region| {
                    let descriptor = BufferDescriptor::new(region);
                    let id = ChannelId::from_index(index);
                    for half in [Half::Ping, Half::Pong] {
                        let (addr, len) = descriptor.half(half);
                        self.hw.program_buffer(id, half, addr, len);
                    }
                    descriptor
                }),
                BufferLayout::Shared(_) => None,
            };
            let runtime = ChannelRuntime {
                request: setup.request,
                receive: setup.receive,
                descriptor,
                fill: 0,
                full: false,
                batch: Batch::default(),
            };
            // Capacity equals MAX_CHANNELS and the schedule accepted the count.
            if table.push(runtime).is_err() {
                return Err(Error::InvalidChannelCount { count: index });
            }
        }

        // A previously allocated transfer channel is reused.
        let handle = self.shared.as_ref().and_then(|ring| ring.handle);
        self.shared = match layout {
            BufferLayout::Shared(region) => Some(SharedRing {
                descriptor: BufferDescriptor::new(region),
                handle,
            }),
            BufferLayout::PerChannel(_) => None,
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "configured {=usize} channels at {=u32} Hz base, cycle {=u16} ticks",
            table.len(),
            config.base_clock_hz,
            schedule.cycle_ticks()
        );

        self.channels = table;
        self.schedule = Some(schedule);
        self.config = config;
        self.state = PipelineState::Configured;
        Ok(())
    }

    /// Enable the configured channels and the sampling clock.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Configured`; [`Error::TransferError`]
    /// if the shared ring cannot be armed, in which case the pipeline stays
    /// `Configured` with every channel disabled again.
    pub fn start(&mut self) -> Result<()> {
        if self.state != PipelineState::Configured {
            return Err(Error::InvalidState { state: self.state });
        }

        for (index, runtime) in self.channels.iter_mut().enumerate() {
            runtime.reset();
            self.hw.enable_channel(ChannelId::from_index(index));
        }

        match self.shared.as_mut() {
            None => {
                for index in 0..self.channels.len() {
                    self.hw.unmask_interrupt(ChannelId::from_index(index));
                }
            }
            Some(ring) => {
                ring.descriptor.active_half = Half::Ping;
                if let Err(fault) = arm_ring(&mut self.transfer, &self.profile, ring) {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("shared ring not armed: {}", fault);
                    for index in 0..self.channels.len() {
                        self.hw.disable_channel(ChannelId::from_index(index));
                    }
                    return Err(fault.into());
                }
            }
        }

        self.hw.set_sampling_clock(true);
        self.state = PipelineState::Running;

        #[cfg(feature = "defmt")]
        defmt::info!("acquisition started");
        Ok(())
    }

    /// Stop sampling. Descriptors and the schedule stay readable.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless `Running`.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != PipelineState::Running {
            return Err(Error::InvalidState { state: self.state });
        }

        self.hw.set_sampling_clock(false);
        for index in 0..self.channels.len() {
            let id = ChannelId::from_index(index);
            self.hw.mask_interrupt(id);
            self.hw.disable_channel(id);
        }
        if let Some(handle) = self.shared.as_ref().and_then(|ring| ring.handle) {
            self.transfer.abort(handle);
        }
        for runtime in &mut self.channels {
            runtime.fill = 0;
            runtime.full = false;
        }
        self.state = PipelineState::Idle;

        #[cfg(feature = "defmt")]
        defmt::info!("acquisition stopped");
        Ok(())
    }

    /// Forget every channel, descriptor and schedule.
    ///
    /// Calibration is factory data and survives.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] while running.
    pub fn deinit(&mut self) -> Result<()> {
        self.require_not_running()?;
        self.channels.clear();
        self.schedule = None;
        self.shared = None;
        self.config = AcquisitionConfig::default();
        self.state = PipelineState::Idle;
        Ok(())
    }

    /// Give the collaborators back.
    pub fn free(self) -> (H, T) {
        (self.hw, self.transfer)
    }

    // ── Interrupt entry points ──────────────────────────────────────────────

    /// Half-full interrupt of the per-channel layout.
    pub fn on_interrupt<C>(&mut self, _token: &IsrToken, client: &mut C)
    where
        C: AcquisitionClient + ?Sized,
    {
        if self.state != PipelineState::Running {
            return;
        }
        let status = self.hw.read_interrupt_status();
        let mut filled: [Option<Half>; MAX_CHANNELS] = [None; MAX_CHANNELS];

        // Pass 1: acknowledge, swap, re-arm.
        for (index, slot) in filled.iter_mut().enumerate() {
            let id = ChannelId::from_index(index);
            if status & id.mask() == 0 {
                continue;
            }
            self.hw.clear_interrupt(id);
            let Some(descriptor) = self
                .channels
                .get_mut(index)
                .and_then(|runtime| runtime.descriptor.as_mut())
            else {
                continue;
            };
            let half = descriptor.swap();
            let (addr, len) = descriptor.half(half);
            self.hw.program_buffer(id, half, addr, len);
            *slot = Some(half);
        }

        // Pass 2: drain the filled halves.
        let Self {
            hw,
            channels,
            calibration,
            config,
            ..
        } = self;
        for (index, runtime) in channels.iter_mut().enumerate() {
            let Some(half) = filled.get(index).copied().flatten() else {
                continue;
            };
            let Some(descriptor) = runtime.descriptor else {
                continue;
            };
            let id = ChannelId::from_index(index);
            let (addr, len) = descriptor.half(half);
            runtime.begin();
            for_each_word(hw, addr, len, |raw| {
                let value = condition(config, calibration, runtime, raw);
                runtime.push(id, value, config.auto_reset, client);
            });
            runtime.finish(id, client);
        }
    }

    /// Completion interrupt of the shared-ring transfer.
    pub fn on_transfer_complete<C>(&mut self, _token: &IsrToken, client: &mut C)
    where
        C: AcquisitionClient + ?Sized,
    {
        if self.state != PipelineState::Running {
            return;
        }
        let Self {
            hw,
            transfer,
            profile,
            channels,
            calibration,
            config,
            shared,
            ..
        } = self;
        let Some(ring) = shared.as_mut() else {
            return;
        };

        let half = ring.descriptor.swap();
        let (addr, len) = ring.descriptor.half(half);
        if let Some(handle) = ring.handle {
            if let Err(fault) = transfer.start_transfer(handle, profile.fifo_addr, addr, len) {
                #[cfg(feature = "defmt")]
                defmt::warn!("shared ring re-arm failed: {}", fault);
                broadcast_fault(channels, fault, client);
            }
        }

        for runtime in channels.iter_mut() {
            runtime.begin();
        }
        for_each_word(hw, addr, len, |word| {
            let (channel, raw) = profile.split_fifo_word(word);
            let Some(runtime) = channels.get_mut(usize::from(channel)) else {
                return;
            };
            let value = condition(config, calibration, runtime, raw);
            runtime.push(ChannelId::from_index(usize::from(channel)), value, config.auto_reset, client);
        });
        for (index, runtime) in channels.iter_mut().enumerate() {
            runtime.finish(ChannelId::from_index(index), client);
        }
    }

    /// Error interrupt of the transfer engine. The pipeline keeps running.
    pub fn on_transfer_error<C>(&mut self, _token: &IsrToken, fault: TransferFault, client: &mut C)
    where
        C: AcquisitionClient + ?Sized,
    {
        if self.state != PipelineState::Running {
            return;
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("transfer fault: {}", fault);
        broadcast_fault(&self.channels, fault, client);
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Schedule of the last successful configuration.
    #[must_use]
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    /// Ping-pong descriptor of `channel` (per-channel layout).
    #[must_use]
    pub fn descriptor(&self, channel: ChannelId) -> Option<BufferDescriptor> {
        self.channels
            .get(channel.index())
            .and_then(|runtime| runtime.descriptor)
    }

    /// Descriptor of the shared ring (shared layout).
    #[must_use]
    pub fn shared_descriptor(&self) -> Option<BufferDescriptor> {
        self.shared.as_ref().map(|ring| ring.descriptor)
    }

    /// Samples collected towards `channel`'s current group.
    #[must_use]
    pub fn fill_count(&self, channel: ChannelId) -> Option<u16> {
        self.channels.get(channel.index()).map(|runtime| runtime.fill)
    }

    /// Calibration applied to samples.
    #[must_use]
    pub fn calibration(&self) -> &CalibrationParams {
        &self.calibration
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Chip memory map in use.
    #[must_use]
    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }

    /// Converter collaborator.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Transfer collaborator.
    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    fn require_not_running(&self) -> Result<()> {
        if self.state == PipelineState::Running {
            Err(Error::InvalidState { state: self.state })
        } else {
            Ok(())
        }
    }
}

/// Allocate (once) and queue both halves of the shared ring.
fn arm_ring<T: TransferService>(
    transfer: &mut T,
    profile: &HardwareProfile,
    ring: &mut SharedRing,
) -> core::result::Result<(), TransferFault> {
    let handle = match ring.handle {
        Some(handle) => handle,
        None => {
            let handle = transfer.allocate_channel()?;
            transfer.register_callbacks(handle)?;
            ring.handle = Some(handle);
            handle
        }
    };
    for half in [Half::Ping, Half::Pong] {
        let (addr, len) = ring.descriptor.half(half);
        transfer.start_transfer(handle, profile.fifo_addr, addr, len)?;
    }
    Ok(())
}

fn broadcast_fault<C>(channels: &[ChannelRuntime<'_>], fault: TransferFault, client: &mut C)
where
    C: AcquisitionClient + ?Sized,
{
    for index in 0..channels.len() {
        client.on_event(
            ChannelId::from_index(index),
            AcquisitionEvent::TransferError(fault),
            &[],
        );
    }
}

/// Mask to 12 bits and, when enabled, calibrate for the channel's input mode.
#[allow(clippy::cast_possible_wrap)] // Safety: 12-bit value fits i16
fn condition(
    config: &AcquisitionConfig,
    calibration: &CalibrationParams,
    runtime: &ChannelRuntime<'_>,
    raw: u16,
) -> i16 {
    if config.calibrate {
        calibration.apply(raw, runtime.request.input)
    } else {
        (raw & 0x0FFF) as i16
    }
}

/// Read `len` words from sample RAM at `addr` in bounded chunks.
#[allow(clippy::arithmetic_side_effects)] // Safety: done < len, n <= len - done
#[allow(clippy::cast_possible_truncation)] // Safety: n <= ISR_CHUNK_SAMPLES (32)
fn for_each_word<H, F>(hw: &mut H, addr: u32, len: u16, mut f: F)
where
    H: HardwareOps + ?Sized,
    F: FnMut(u16),
{
    let mut chunk = [0u16; ISR_CHUNK_SAMPLES];
    let mut done: u16 = 0;
    while done < len {
        let n = usize::from(len - done).min(ISR_CHUNK_SAMPLES);
        let words = chunk.get_mut(..n).unwrap_or_default();
        let offset = u32::from(done).saturating_mul(SAMPLE_BYTES);
        hw.read_samples(addr.saturating_add(offset), words);
        for &word in words.iter() {
            f(word);
        }
        done += n as u16;
    }
}

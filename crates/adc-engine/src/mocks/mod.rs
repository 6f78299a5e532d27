//! Mock implementations for testing
//!
//! Test doubles for every collaborator trait. They only use `heapless`, so
//! they build on `no_std` as well. Integration tests enable the `mocks`
//! feature to reach them.

#![cfg(any(test, feature = "mocks"))]

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::hardware::{
    Half, HardwareOps, TransferFault, TransferHandle, TransferService, TrimSource,
};
use crate::pipeline::{AcquisitionClient, AcquisitionEvent};
use crate::types::{ChannelId, InputMode};

/// Base address of the mock sample RAM (Gen1/Gen2 window start).
pub const MOCK_RAM_BASE: u32 = 0x2000_0000;

/// Words of mock sample RAM.
pub const MOCK_RAM_WORDS: usize = 256;

/// One recorded register operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    /// `set_clock_divider`
    ClockDivider {
        /// On-phase ticks.
        on_cycles: u32,
        /// Cycle length.
        total_cycles: u32,
    },
    /// `program_schedule`
    Schedule {
        /// Channel.
        channel: ChannelId,
        /// Slot factor.
        slot_factor: u16,
        /// Phase offset.
        phase_offset: u16,
    },
    /// `program_buffer`
    Buffer {
        /// Channel.
        channel: ChannelId,
        /// Half written.
        half: Half,
        /// Start address.
        addr: u32,
        /// Length in samples.
        len: u16,
    },
    /// `enable_channel`
    Enable(ChannelId),
    /// `disable_channel`
    Disable(ChannelId),
    /// `unmask_interrupt`
    Unmask(ChannelId),
    /// `mask_interrupt`
    Mask(ChannelId),
    /// `set_sampling_clock`
    SamplingClock(bool),
    /// `clear_interrupt`
    Clear(ChannelId),
}

/// Mock converter: records every call and simulates sample RAM.
pub struct MockHardware {
    calls: Vec<HwCall, 256>,
    ram: [u16; MOCK_RAM_WORDS],
    pending: u16,
    sampling: bool,
}

impl MockHardware {
    /// Create new mock converter with zeroed sample RAM
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            ram: [0; MOCK_RAM_WORDS],
            pending: 0,
            sampling: false,
        }
    }

    /// Recorded calls, oldest first
    pub fn calls(&self) -> &[HwCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of `program_buffer` calls
    pub fn buffers_programmed(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, HwCall::Buffer { .. }))
            .count()
    }

    /// Sampling clock gate
    pub fn sampling_enabled(&self) -> bool {
        self.sampling
    }

    /// Raise the half-full flag of `channel`
    pub fn raise_interrupt(&mut self, channel: ChannelId) {
        self.pending |= channel.mask();
    }

    /// Pending flags
    pub fn pending(&self) -> u16 {
        self.pending
    }

    /// Store raw words at `addr` as if hardware had converted them.
    ///
    /// Words outside the mock window are ignored.
    pub fn write_samples(&mut self, addr: u32, words: &[u16]) {
        for (i, &word) in words.iter().enumerate() {
            if let Some(slot) = word_index(addr, i).and_then(|idx| self.ram.get_mut(idx)) {
                *slot = word;
            }
        }
    }

    fn record(&mut self, call: HwCall) {
        // A full log stops recording; tests never get that far.
        let _ = self.calls.push(call);
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

fn word_index(addr: u32, offset: usize) -> Option<usize> {
    let byte = addr.checked_sub(MOCK_RAM_BASE)?;
    usize::try_from(byte / 2).ok()?.checked_add(offset)
}

impl HardwareOps for MockHardware {
    fn set_clock_divider(&mut self, on_cycles: u32, total_cycles: u32) {
        self.record(HwCall::ClockDivider {
            on_cycles,
            total_cycles,
        });
    }

    fn program_schedule(&mut self, channel: ChannelId, slot_factor: u16, phase_offset: u16) {
        self.record(HwCall::Schedule {
            channel,
            slot_factor,
            phase_offset,
        });
    }

    fn program_buffer(&mut self, channel: ChannelId, half: Half, addr: u32, len: u16) {
        self.record(HwCall::Buffer {
            channel,
            half,
            addr,
            len,
        });
    }

    fn enable_channel(&mut self, channel: ChannelId) {
        self.record(HwCall::Enable(channel));
    }

    fn disable_channel(&mut self, channel: ChannelId) {
        self.record(HwCall::Disable(channel));
    }

    fn unmask_interrupt(&mut self, channel: ChannelId) {
        self.record(HwCall::Unmask(channel));
    }

    fn mask_interrupt(&mut self, channel: ChannelId) {
        self.record(HwCall::Mask(channel));
    }

    fn set_sampling_clock(&mut self, enabled: bool) {
        self.sampling = enabled;
        self.record(HwCall::SamplingClock(enabled));
    }

    fn read_interrupt_status(&mut self) -> u16 {
        self.pending
    }

    fn clear_interrupt(&mut self, channel: ChannelId) {
        self.pending &= !channel.mask();
        self.record(HwCall::Clear(channel));
    }

    fn read_samples(&mut self, addr: u32, out: &mut [u16]) {
        for (i, word) in out.iter_mut().enumerate() {
            *word = word_index(addr, i)
                .and_then(|idx| self.ram.get(idx))
                .copied()
                .unwrap_or(0);
        }
    }
}

/// Mock transfer engine
pub struct MockTransfer {
    allocated: u8,
    registered: bool,
    started: Vec<(u32, u32, u16), 64>,
    aborted: usize,
    fail_allocate: bool,
    fail_start: Option<TransferFault>,
}

impl MockTransfer {
    /// Create new mock transfer engine with free channels
    pub fn new() -> Self {
        Self {
            allocated: 0,
            registered: false,
            started: Vec::new(),
            aborted: 0,
            fail_allocate: false,
            fail_start: None,
        }
    }

    /// Make every allocation fail with `NoChannel`
    pub fn exhaust_channels(&mut self) {
        self.fail_allocate = true;
    }

    /// Make the next `start_transfer` fail with `fault`
    pub fn fail_next_start(&mut self, fault: TransferFault) {
        self.fail_start = Some(fault);
    }

    /// `(src, dst, count)` of every started transfer, oldest first
    pub fn started(&self) -> &[(u32, u32, u16)] {
        &self.started
    }

    /// Channels handed out so far
    pub fn allocated(&self) -> u8 {
        self.allocated
    }

    /// Callbacks registered
    pub fn registered(&self) -> bool {
        self.registered
    }

    /// Number of `abort` calls
    pub fn aborted(&self) -> usize {
        self.aborted
    }
}

impl Default for MockTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferService for MockTransfer {
    fn allocate_channel(&mut self) -> Result<TransferHandle, TransferFault> {
        if self.fail_allocate {
            return Err(TransferFault::NoChannel);
        }
        let handle = TransferHandle(self.allocated);
        self.allocated = self.allocated.saturating_add(1);
        Ok(handle)
    }

    fn register_callbacks(&mut self, handle: TransferHandle) -> Result<(), TransferFault> {
        if handle.0 >= self.allocated {
            return Err(TransferFault::Rejected);
        }
        self.registered = true;
        Ok(())
    }

    fn start_transfer(
        &mut self,
        _handle: TransferHandle,
        src: u32,
        dst: u32,
        count: u16,
    ) -> Result<(), TransferFault> {
        if let Some(fault) = self.fail_start.take() {
            return Err(fault);
        }
        self.started
            .push((src, dst, count))
            .map_err(|_| TransferFault::Rejected)
    }

    fn abort(&mut self, _handle: TransferHandle) {
        self.aborted = self.aborted.saturating_add(1);
    }
}

/// Mock trim storage
pub struct MockTrim {
    ready_after_polls: Option<u32>,
    polls: u32,
    offsets: [u16; 2],
    gains: [u32; 2],
}

impl MockTrim {
    /// Trim that is ready after `polls` not-ready answers, with the given
    /// `(offset, packed gain)` per mode
    pub fn new(single: (u16, u32), differential: (u16, u32), polls: u32) -> Self {
        Self {
            ready_after_polls: Some(polls),
            polls: 0,
            offsets: [single.0, differential.0],
            gains: [single.1, differential.1],
        }
    }

    /// Trim that never becomes ready
    pub fn never_ready() -> Self {
        Self {
            ready_after_polls: None,
            ..Self::new((0, 1 << 14), (0, 1 << 14), 0)
        }
    }

    /// `is_ready` calls so far
    pub fn polls(&self) -> u32 {
        self.polls
    }
}

const fn mode_index(mode: InputMode) -> usize {
    match mode {
        InputMode::SingleEnded => 0,
        InputMode::Differential => 1,
    }
}

impl TrimSource for MockTrim {
    fn is_ready(&mut self) -> bool {
        let ready = self.ready_after_polls.is_some_and(|n| self.polls >= n);
        self.polls = self.polls.saturating_add(1);
        ready
    }

    fn read_offset(&mut self, mode: InputMode) -> u16 {
        self.offsets.get(mode_index(mode)).copied().unwrap_or(0)
    }

    fn read_gain(&mut self, mode: InputMode) -> u32 {
        self.gains.get(mode_index(mode)).copied().unwrap_or(0)
    }
}

/// Mock delay: accumulates requested time instead of sleeping
#[derive(Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    /// Create new mock delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in µs
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns = self.elapsed_ns.saturating_add(u64::from(ns));
    }
}

/// One event seen by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Channel.
    pub channel: ChannelId,
    /// Event.
    pub event: AcquisitionEvent,
    /// Copy of the delivered samples (first 64).
    pub samples: Vec<i16, 64>,
}

/// Client that records every event
#[derive(Default)]
pub struct RecordingClient {
    events: Vec<RecordedEvent, 64>,
}

impl RecordingClient {
    /// Create new recording client
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Number of `event`s for `channel`
    pub fn count(&self, channel: ChannelId, event: AcquisitionEvent) -> usize {
        self.events
            .iter()
            .filter(|e| e.channel == channel && e.event == event)
            .count()
    }

    /// Forget recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl AcquisitionClient for RecordingClient {
    fn on_event(&mut self, channel: ChannelId, event: AcquisitionEvent, samples: &[i16]) {
        let mut copy = Vec::new();
        for &s in samples.iter().take(64) {
            let _ = copy.push(s);
        }
        let _ = self.events.push(RecordedEvent {
            channel,
            event,
            samples: copy,
        });
    }
}

//! Collaborator traits and the chip-family strategy.
//!
//! The engine never touches registers itself. Everything it needs from the
//! silicon goes through three injected traits:
//!
//! - [`HardwareOps`]: converter, sequencer and per-channel ping-pong
//!   descriptors
//! - [`TransferService`]: the shared-FIFO transfer engine (opaque DMA)
//! - [`TrimSource`]: factory trim storage
//!
//! Test doubles for all three live in `crate::mocks` (`mocks` feature).

use crate::types::{ChannelId, InputMode};

/// Which half of a ping-pong pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    /// First half; active after `start()`.
    #[default]
    Ping,
    /// Second half.
    Pong,
}

impl Half {
    /// The other half.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Ping => Self::Pong,
            Self::Pong => Self::Ping,
        }
    }
}

/// Converter and sequencer register operations.
///
/// Implementations are thin register writers; none of these can fail.
pub trait HardwareOps {
    /// Split one conversion cycle into `on_cycles` of sample-hold out of
    /// `total_cycles`.
    fn set_clock_divider(&mut self, on_cycles: u32, total_cycles: u32);

    /// Place `channel` in the time-division schedule.
    fn program_schedule(&mut self, channel: ChannelId, slot_factor: u16, phase_offset: u16);

    /// Point one half of `channel`'s ping-pong pair at `addr`, `len` samples.
    fn program_buffer(&mut self, channel: ChannelId, half: Half, addr: u32, len: u16);

    /// Let `channel` take part in the schedule.
    fn enable_channel(&mut self, channel: ChannelId);

    /// Remove `channel` from the schedule.
    fn disable_channel(&mut self, channel: ChannelId);

    /// Allow `channel`'s half-full interrupt.
    fn unmask_interrupt(&mut self, channel: ChannelId);

    /// Block `channel`'s half-full interrupt.
    fn mask_interrupt(&mut self, channel: ChannelId);

    /// Gate the sampling clock.
    fn set_sampling_clock(&mut self, enabled: bool);

    /// Pending half-full flags, bit `n` for channel `n`.
    fn read_interrupt_status(&mut self) -> u16;

    /// Acknowledge `channel`'s half-full flag.
    fn clear_interrupt(&mut self, channel: ChannelId);

    /// Copy `out.len()` raw words starting at sample-RAM address `addr`.
    fn read_samples(&mut self, addr: u32, out: &mut [u16]);
}

/// Handle to a channel of the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferHandle(pub u8);

/// Failure reported by the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferFault {
    /// Bus error while moving data.
    #[error("bus error")]
    Bus,
    /// No free transfer channel.
    #[error("no free transfer channel")]
    NoChannel,
    /// Request rejected (bad address, count or handle).
    #[error("request rejected")]
    Rejected,
}

/// Transfer engine moving words from the shared FIFO into sample RAM.
///
/// Completion and errors are reported back by the platform calling
/// [`AcquisitionPipeline::on_transfer_complete`] and
/// [`AcquisitionPipeline::on_transfer_error`] from the transfer interrupt.
///
/// [`AcquisitionPipeline::on_transfer_complete`]: crate::pipeline::AcquisitionPipeline::on_transfer_complete
/// [`AcquisitionPipeline::on_transfer_error`]: crate::pipeline::AcquisitionPipeline::on_transfer_error
pub trait TransferService {
    /// Claim a channel.
    ///
    /// # Errors
    ///
    /// [`TransferFault::NoChannel`] when every channel is taken.
    fn allocate_channel(&mut self) -> Result<TransferHandle, TransferFault>;

    /// Route completion and error interrupts of `handle` to the caller.
    ///
    /// # Errors
    ///
    /// [`TransferFault::Rejected`] for an unknown handle.
    fn register_callbacks(&mut self, handle: TransferHandle) -> Result<(), TransferFault>;

    /// Move `count` words from `src` to `dst`.
    ///
    /// # Errors
    ///
    /// Any fault the engine reports synchronously.
    fn start_transfer(
        &mut self,
        handle: TransferHandle,
        src: u32,
        dst: u32,
        count: u16,
    ) -> Result<(), TransferFault>;

    /// Cancel whatever `handle` is doing.
    fn abort(&mut self, handle: TransferHandle);
}

/// Factory trim storage (efuse or OTP row).
pub trait TrimSource {
    /// Trim rows readable.
    fn is_ready(&mut self) -> bool;

    /// Raw offset trim for `mode`.
    fn read_offset(&mut self, mode: InputMode) -> u16;

    /// Packed gain trim for `mode` (integer `<< 14 | thousandths`).
    fn read_gain(&mut self, mode: InputMode) -> u32;
}

// ── Chip families ────────────────────────────────────────────────────────────

/// Supported converter generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipFamily {
    /// First generation: 64 KiB sample RAM.
    Gen1,
    /// Second generation: 256 KiB sample RAM, relocated FIFO.
    Gen2,
}

/// Memory map and limits of one chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareProfile {
    /// First byte of the sample RAM window.
    pub sample_ram_start: u32,
    /// One past the last byte of the sample RAM window.
    pub sample_ram_end: u32,
    /// Largest half the 10-bit descriptor length field holds (samples).
    pub max_half_len: u16,
    /// Address of the shared conversion FIFO.
    pub fifo_addr: u32,
    /// Bit position of the channel id inside a FIFO word.
    pub channel_id_shift: u8,
}

impl HardwareProfile {
    /// Gen1 memory map.
    pub const GEN1: Self = Self {
        sample_ram_start: 0x2000_0000,
        sample_ram_end: 0x2001_0000,
        max_half_len: 1023,
        fifo_addr: 0x4000_E000,
        channel_id_shift: 12,
    };

    /// Gen2 memory map.
    pub const GEN2: Self = Self {
        sample_ram_start: 0x2000_0000,
        sample_ram_end: 0x2004_0000,
        max_half_len: 1023,
        fifo_addr: 0x4007_E000,
        channel_id_shift: 12,
    };

    /// True when `[addr, addr + bytes)` lies inside sample RAM.
    #[must_use]
    pub fn contains(&self, addr: u32, bytes: u32) -> bool {
        addr >= self.sample_ram_start
            && addr
                .checked_add(bytes)
                .is_some_and(|end| end <= self.sample_ram_end)
    }

    /// Split a FIFO word into `(channel index, 12-bit raw sample)`.
    #[must_use]
    pub fn split_fifo_word(&self, word: u16) -> (u8, u16) {
        let channel = word.checked_shr(u32::from(self.channel_id_shift)).unwrap_or(0) & 0xF;
        // Truncation is exact: masked to 4 bits above.
        #[allow(clippy::cast_possible_truncation)]
        let channel = channel as u8;
        (channel, word & 0x0FFF)
    }
}

impl ChipFamily {
    /// Memory map of this family.
    #[must_use]
    pub const fn profile(self) -> HardwareProfile {
        match self {
            Self::Gen1 => HardwareProfile::GEN1,
            Self::Gen2 => HardwareProfile::GEN2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_toggles() {
        assert_eq!(Half::Ping.toggled(), Half::Pong);
        assert_eq!(Half::Ping.toggled().toggled(), Half::Ping);
    }

    #[test]
    fn sample_ram_window() {
        let p = ChipFamily::Gen1.profile();
        assert!(p.contains(0x2000_0000, 2));
        assert!(p.contains(0x2000_FFFE, 2));
        assert!(!p.contains(0x2000_FFFE, 4));
        assert!(!p.contains(0x1FFF_FFFE, 2));
        assert!(!p.contains(u32::MAX, 2));
        assert!(ChipFamily::Gen2.profile().contains(0x2003_0000, 2));
    }

    #[test]
    fn fifo_word_carries_channel_in_top_nibble() {
        let p = ChipFamily::Gen2.profile();
        assert_eq!(p.split_fifo_word(0x3ABC), (3, 0x0ABC));
        assert_eq!(p.split_fifo_word(0xF001), (15, 0x0001));
    }

    #[test]
    fn fault_display() {
        assert_eq!(TransferFault::Bus.to_string(), "bus error");
        assert_eq!(TransferFault::NoChannel.to_string(), "no free transfer channel");
        assert_eq!(TransferFault::Rejected.to_string(), "request rejected");
    }

    #[test]
    fn fault_is_an_error_type() {
        fn assert_error<E: core::error::Error>(_: &E) {}
        assert_error(&TransferFault::Rejected);
    }
}

//! Ping-pong buffer descriptors.
//!
//! Each enabled channel (or the shared FIFO ring) owns two halves in the
//! converter's sample RAM. Hardware fills the active half; on the half-full
//! interrupt the pipeline swaps halves and re-arms the one just drained.
//!
//! ```text
//!   ping_addr                 pong_addr
//!   ├── ping_len × u16 ──┤    ├── pong_len × u16 ──┤
//!   ▲ active after start()    ▲ active after first swap
//! ```

use crate::error::{Error, Result};
use crate::hardware::{Half, HardwareProfile};

/// Bytes per raw sample word.
pub const SAMPLE_BYTES: u32 = 2;

/// Caller-supplied placement of one ping-pong pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PingPongRegion {
    /// Start of the ping half.
    pub ping_addr: u32,
    /// Start of the pong half.
    pub pong_addr: u32,
    /// Ping half length in samples.
    pub ping_len: u16,
    /// Pong half length in samples.
    pub pong_len: u16,
}

impl PingPongRegion {
    /// Two equal halves laid out back to back from `addr`.
    #[must_use]
    pub const fn contiguous(addr: u32, half_len: u16) -> Self {
        Self {
            ping_addr: addr,
            pong_addr: addr.wrapping_add((half_len as u32).wrapping_mul(SAMPLE_BYTES)),
            ping_len: half_len,
            pong_len: half_len,
        }
    }

    /// Check the pair against a chip's memory map.
    ///
    /// # Errors
    ///
    /// - [`Error::PingPongAddressCollision`]: both halves start at the same
    ///   address or overlap.
    /// - [`Error::AddressOutOfRange`]: a half is empty, longer than
    ///   `max_half_len`, not 2-byte aligned or outside sample RAM.
    pub fn validate(&self, profile: &HardwareProfile, channel: u8) -> Result<()> {
        if self.ping_addr == self.pong_addr || self.halves_overlap() {
            return Err(Error::PingPongAddressCollision { channel });
        }
        check_half(profile, self.ping_addr, self.ping_len)?;
        check_half(profile, self.pong_addr, self.pong_len)
    }

    fn halves_overlap(&self) -> bool {
        let span = |addr: u32, len: u16| {
            let bytes = u64::from(len).saturating_mul(u64::from(SAMPLE_BYTES));
            (u64::from(addr), u64::from(addr).saturating_add(bytes))
        };
        let (ping_start, ping_end) = span(self.ping_addr, self.ping_len);
        let (pong_start, pong_end) = span(self.pong_addr, self.pong_len);
        ping_start < pong_end && pong_start < ping_end
    }
}

fn check_half(profile: &HardwareProfile, addr: u32, len: u16) -> Result<()> {
    let out_of_range = Error::AddressOutOfRange { addr };
    if len == 0 || len > profile.max_half_len {
        return Err(out_of_range);
    }
    if addr.checked_rem(SAMPLE_BYTES) != Some(0) {
        return Err(out_of_range);
    }
    let bytes = u32::from(len).saturating_mul(SAMPLE_BYTES);
    if !profile.contains(addr, bytes) {
        return Err(out_of_range);
    }
    Ok(())
}

/// Programmed ping-pong pair plus the half hardware is currently filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferDescriptor {
    /// Start of the ping half.
    pub ping_addr: u32,
    /// Start of the pong half.
    pub pong_addr: u32,
    /// Ping half length in samples.
    pub ping_len: u16,
    /// Pong half length in samples.
    pub pong_len: u16,
    /// Half hardware is writing.
    pub active_half: Half,
}

impl BufferDescriptor {
    /// Descriptor for a validated region, ping active.
    #[must_use]
    pub const fn new(region: PingPongRegion) -> Self {
        Self {
            ping_addr: region.ping_addr,
            pong_addr: region.pong_addr,
            ping_len: region.ping_len,
            pong_len: region.pong_len,
            active_half: Half::Ping,
        }
    }

    /// `(addr, len)` of `half`.
    #[must_use]
    pub const fn half(&self, half: Half) -> (u32, u16) {
        match half {
            Half::Ping => (self.ping_addr, self.ping_len),
            Half::Pong => (self.pong_addr, self.pong_len),
        }
    }

    /// Swap halves after a half-full event.
    ///
    /// Returns the half that just filled, which is now idle.
    pub fn swap(&mut self) -> Half {
        let filled = self.active_half;
        self.active_half = filled.toggled();
        filled
    }
}

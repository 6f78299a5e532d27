//! Phase allocation: give every channel a start tick so no two channels
//! claim the same slot of the time-division schedule.
//!
//! Greedy first fit. Channel 0 starts at tick 0; each later channel takes the
//! lowest tick in `0..max_factor` that none of the earlier channels sample
//! on. With power-of-two factors listed smallest first and a utilisation of
//! at most one, a free tick always exists (buddy-allocation argument), so the
//! [`Error::SchedulingInfeasible`] path is only reachable with hand-built
//! factor lists.

use heapless::Vec;

use crate::config::MAX_CHANNELS;
use crate::error::{Error, Result};

/// Assign a phase offset to every channel.
///
/// # Errors
///
/// [`Error::InvalidChannelCount`] for more than 16 factors,
/// [`Error::SchedulingInfeasible`] when a zero factor is supplied or no
/// free tick exists for some channel.
#[allow(clippy::indexing_slicing)] // Safety: j < i <= offsets.len() inside the scan
pub fn assign_offsets(slot_factors: &[u16]) -> Result<Vec<u16, MAX_CHANNELS>> {
    if slot_factors.len() > MAX_CHANNELS {
        return Err(Error::InvalidChannelCount {
            count: slot_factors.len(),
        });
    }
    if slot_factors.contains(&0) {
        return Err(Error::SchedulingInfeasible);
    }
    let max_factor = slot_factors.iter().copied().max().unwrap_or(0);

    let mut offsets: Vec<u16, MAX_CHANNELS> = Vec::new();
    for i in 0..slot_factors.len() {
        let offset = if i == 0 {
            0
        } else {
            (0..max_factor)
                .find(|&c| {
                    (0..i).all(|j| !lands_on(c, offsets[j], slot_factors[j], max_factor))
                })
                .ok_or(Error::SchedulingInfeasible)?
        };
        offsets
            .push(offset)
            .map_err(|_| Error::InvalidChannelCount {
                count: slot_factors.len(),
            })?;
    }
    Ok(offsets)
}

/// Does tick `c` fall on one of the slots `offset + k·factor`, `k < max_factor`?
#[allow(clippy::arithmetic_side_effects)] // Safety: c >= offset checked; factor != 0 checked by caller
fn lands_on(c: u16, offset: u16, factor: u16, max_factor: u16) -> bool {
    if c < offset {
        return false;
    }
    let distance = c - offset;
    distance % factor == 0 && distance / factor < max_factor
}

/// True when two channels' slot sets intersect over a schedule cycle.
///
/// `a` and `b` are `(phase_offset, slot_factor)`. The cycle length is taken
/// to be a common multiple of both factors (true for power-of-two factors),
/// so the slots of a channel are exactly the ticks congruent to its offset
/// modulo its factor, and two such classes meet iff the offsets agree modulo
/// `gcd(factor_a, factor_b)`.
#[must_use]
pub fn slots_collide(a: (u16, u16), b: (u16, u16)) -> bool {
    let (offset_a, factor_a) = a;
    let (offset_b, factor_b) = b;
    if factor_a == 0 || factor_b == 0 {
        return false;
    }
    let g = gcd(factor_a, factor_b);
    offset_a.checked_rem(g) == offset_b.checked_rem(g)
}

fn gcd(mut a: u16, mut b: u16) -> u16 {
    while let Some(r) = a.checked_rem(b) {
        a = b;
        b = r;
    }
    a
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    #[test]
    fn first_channel_starts_at_zero() {
        let offsets = assign_offsets(&[8192]).unwrap();
        assert_eq!(offsets.as_slice(), &[0]);
    }

    #[test]
    fn second_channel_takes_first_free_tick() {
        let offsets = assign_offsets(&[2048, 8192]).unwrap();
        assert_eq!(offsets.as_slice(), &[0, 1]);
    }

    #[test]
    fn full_utilisation_packs_every_tick() {
        // 1/2 + 1/4 + 1/8 + 1/8 = 1
        let factors = [2, 4, 8, 8];
        let offsets = assign_offsets(&factors).unwrap();
        assert_eq!(offsets.as_slice(), &[0, 1, 3, 7]);
        for i in 0..factors.len() {
            for j in (i + 1)..factors.len() {
                assert!(!slots_collide(
                    (offsets[i], factors[i]),
                    (offsets[j], factors[j])
                ));
            }
        }
    }

    #[test]
    fn overbooked_factors_are_infeasible() {
        // 1/2 + 1/2 + 1/2 > 1
        assert_eq!(assign_offsets(&[2, 2, 2]), Err(Error::SchedulingInfeasible));
    }

    #[test]
    fn zero_factor_is_rejected() {
        assert_eq!(assign_offsets(&[4, 0]), Err(Error::SchedulingInfeasible));
    }

    #[test]
    fn more_than_sixteen_channels_rejected() {
        let factors = [64u16; 17];
        assert_eq!(
            assign_offsets(&factors),
            Err(Error::InvalidChannelCount { count: 17 })
        );
    }

    #[test]
    fn sixteen_equal_channels_fill_the_cycle() {
        let factors = [16u16; 16];
        let offsets = assign_offsets(&factors).unwrap();
        let expected: [u16; 16] = core::array::from_fn(|i| i as u16);
        assert_eq!(offsets.as_slice(), &expected);
    }

    #[test]
    fn collision_helper_detects_shared_tick() {
        assert!(slots_collide((0, 2), (2, 4)));
        assert!(!slots_collide((0, 2), (1, 4)));
        assert!(slots_collide((1, 8), (9, 16)));
        assert!(!slots_collide((0, 0), (0, 4)));
    }
}

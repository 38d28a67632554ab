//! Balanced assignment of stimuli to the two positions.
//!
//! Each draw samples without replacement from a virtual urn holding the
//! remaining A and B slots, so the run ends with exactly `per_side_quota`
//! trials per side while no single trial's side can be predicted.

use crate::error::{ExperimentError, Result};
use rand::Rng;
use vrt_core::Side;

/// Per-side counters, bumped once per shown stimulus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationState {
    pub count_a: usize,
    pub count_b: usize,
}

impl AllocationState {
    pub fn total(&self) -> usize {
        self.count_a + self.count_b
    }

    pub fn count(&self, side: Side) -> usize {
        match side {
            Side::A => self.count_a,
            Side::B => self.count_b,
        }
    }

    pub fn record(&mut self, side: Side) {
        match side {
            Side::A => self.count_a += 1,
            Side::B => self.count_b += 1,
        }
    }
}

/// Picks the side of the next stimulus.
///
/// A side that already reached `per_side_quota` is never returned; once one
/// side is full every remaining trial is forced onto the other.
pub fn choose_side<R: Rng>(
    count_a: usize,
    count_b: usize,
    per_side_quota: usize,
    remaining_trials: usize,
    rng: &mut R,
) -> Result<Side> {
    let a_full = count_a >= per_side_quota;
    let b_full = count_b >= per_side_quota;

    match (a_full, b_full) {
        (true, true) => Err(ExperimentError::QuotaExhausted {
            count_a,
            count_b,
            per_side_quota,
        }),
        (true, false) => Ok(Side::B),
        (false, true) => Ok(Side::A),
        (false, false) => {
            if remaining_trials == 0 {
                return Err(ExperimentError::QuotaExhausted {
                    count_a,
                    count_b,
                    per_side_quota,
                });
            }
            let p_a = (per_side_quota - count_a) as f64 / remaining_trials as f64;
            let r: f64 = rng.random();
            Ok(if r < p_a { Side::A } else { Side::B })
        }
    }
}

//! Least Recently Used (LRU) Replacement Policy.
//!
//! This policy evicts the cache line that has not been accessed for the longest time.
//! Each set keeps an age vector: age 0 is the Most Recently Used way and age
//! `ways - 1` the Least Recently Used. When a way is touched, every way younger
//! than it ages by one and the touched way becomes age 0, so the ages of the
//! valid ways always form a permutation once every way has been touched.
//!
//! # Performance
//!
//! - **Time Complexity:**
//!   - `update()`: O(W) where W is the number of ways (associativity)
//!   - `victim()`: O(W)
//! - **Space Complexity:** O(S × W) where S is the number of sets
//! - **Hardware Cost:** High - one age counter per way plus comparators
//! - **Best Case:** Working sets that fit in the associativity
//! - **Worst Case:** Scanning patterns larger than cache capacity (thrashing)

use super::ReplacementPolicy;
use crate::common::constants::MAX_WAYS;

/// Recency state of one set.
///
/// Reset state has every way equally old (`ways - 1`), so an untouched set
/// falls back to the lowest eligible way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LruState {
    ages: [u8; MAX_WAYS],
    ways: u8,
}

impl LruState {
    /// Creates the reset state for a set of `ways` ways.
    pub const fn new(ways: usize) -> Self {
        let ways = if ways > MAX_WAYS { MAX_WAYS } else { ways };
        let oldest = ways.saturating_sub(1) as u8;
        Self {
            ages: [oldest; MAX_WAYS],
            ways: ways as u8,
        }
    }

    /// Returns the state after an access to `way`.
    ///
    /// Pure transition: ways younger than `way` age by one, `way` becomes the MRU.
    #[must_use]
    pub const fn touch(self, way: usize) -> Self {
        let mut next = self;
        if way >= self.ways as usize {
            return next;
        }
        let old = self.ages[way];
        let mut w = 0;
        while w < self.ways as usize {
            if self.ages[w] < old {
                next.ages[w] += 1;
            }
            w += 1;
        }
        next.ages[way] = 0;
        next
    }

    /// Returns the age of `way` (0 = most recently used).
    pub const fn age(&self, way: usize) -> u8 {
        self.ages[way]
    }

    /// Returns the oldest eligible way; ties go to the lowest index.
    pub fn oldest(&self, eligible: u32) -> Option<usize> {
        (0..self.ways as usize)
            .filter(|&w| eligible & (1 << w) != 0)
            .fold(None, |best: Option<usize>, w| match best {
                Some(b) if self.ages[b] >= self.ages[w] => Some(b),
                _ => Some(w),
            })
    }
}

/// LRU Policy state.
#[derive(Debug)]
pub struct LruPolicy {
    /// One age vector per set.
    sets: Vec<LruState>,
    ways: usize,
}

impl LruPolicy {
    /// Creates a new LRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            sets: vec![LruState::new(ways); sets],
            ways,
        }
    }

    /// Returns the recency state of `set`.
    pub fn state(&self, set: usize) -> Option<LruState> {
        self.sets.get(set).copied()
    }
}

impl ReplacementPolicy for LruPolicy {
    /// Moves the accessed `way` to the MRU position.
    fn update(&mut self, set: usize, way: usize) {
        if let Some(state) = self.sets.get_mut(set) {
            *state = state.touch(way);
        }
    }

    /// Returns the eligible way with the greatest age.
    fn victim(&self, set: usize, eligible: u32) -> Option<usize> {
        self.sets.get(set)?.oldest(eligible)
    }

    fn reset(&mut self) {
        self.sets.fill(LruState::new(self.ways));
    }
}

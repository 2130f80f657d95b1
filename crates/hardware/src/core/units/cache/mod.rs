//! Non-blocking Set-Associative Data Cache.
//!
//! This module implements the L1 data cache. It is split into:
//! 1. **Storage:** `CacheStorage`, the per-set tag, data, valid, and dirty arrays plus LRU state.
//! 2. **MSHR File:** Outstanding line misses with coalesced targets (`mshr`).
//! 3. **Arbiter:** Serializes MSHRs onto the single backend port (`arbiter`).
//! 4. **Controller:** Request path and refill state machine (`controller`).
//!
//! Only the controller mutates storage; every other component reads it.

/// Memory port arbiter.
pub mod arbiter;

/// Cache controller: request path and refill FSM.
pub mod controller;

/// Miss status holding registers.
pub mod mshr;

/// Cache replacement policy implementations (LRU).
pub mod policies;

use self::policies::{LruPolicy, LruState, ReplacementPolicy};
use crate::common::CacheGeometry;
use crate::common::data::merge_bytes;

/// Result of a tag lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The line is resident in the given way.
    Hit(usize),
    /// No valid way holds the line.
    Miss,
}

/// Tag, data, valid, and dirty arrays of the data cache.
///
/// Laid out as struct-of-arrays indexed by `set * ways + way`; line data is
/// further indexed by word. Within one set at most one valid way holds a tag.
#[derive(Debug)]
pub struct CacheStorage {
    geometry: CacheGeometry,
    tags: Vec<u32>,
    valid: Vec<bool>,
    dirty: Vec<bool>,
    data: Vec<u32>,
    policy: LruPolicy,
}

impl CacheStorage {
    /// Creates an empty cache (all lines invalid, LRU in reset state).
    pub fn new(geometry: CacheGeometry) -> Self {
        let lines = geometry.sets * geometry.ways;
        Self {
            geometry,
            tags: vec![0; lines],
            valid: vec![false; lines],
            dirty: vec![false; lines],
            data: vec![0; lines * geometry.line_words()],
            policy: LruPolicy::new(geometry.sets, geometry.ways),
        }
    }

    /// Returns the geometry this storage was built with.
    pub const fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    #[inline]
    const fn slot(&self, set: usize, way: usize) -> usize {
        set * self.geometry.ways + way
    }

    #[inline]
    fn word_index(&self, set: usize, way: usize, word: usize) -> usize {
        self.slot(set, way) * self.geometry.line_words() + word
    }

    /// Looks up `addr` without touching recency state.
    pub fn lookup(&self, addr: u32) -> Lookup {
        let set = self.geometry.set_index(addr);
        let tag = self.geometry.tag(addr);
        (0..self.geometry.ways)
            .find(|&way| {
                let idx = self.slot(set, way);
                self.valid[idx] && self.tags[idx] == tag
            })
            .map_or(Lookup::Miss, Lookup::Hit)
    }

    /// Returns `true` if the line containing `addr` is resident.
    pub fn contains(&self, addr: u32) -> bool {
        matches!(self.lookup(addr), Lookup::Hit(_))
    }

    /// Reads one word of a resident line.
    pub fn read_word(&self, set: usize, way: usize, word: usize) -> u32 {
        self.data[self.word_index(set, way, word)]
    }

    /// Merges the enabled bytes of `data` into one word and marks the line dirty.
    ///
    /// A zero `byte_enable` is a no-op and leaves the dirty bit untouched.
    pub fn write_bytes(&mut self, set: usize, way: usize, word: usize, data: u32, byte_enable: u8) {
        if byte_enable == 0 {
            return;
        }
        let idx = self.word_index(set, way, word);
        self.data[idx] = merge_bytes(self.data[idx], data, byte_enable);
        let slot = self.slot(set, way);
        self.dirty[slot] = true;
    }

    /// Returns the data words of a line.
    pub fn line_data(&self, set: usize, way: usize) -> &[u32] {
        let start = self.word_index(set, way, 0);
        &self.data[start..start + self.geometry.line_words()]
    }

    /// Installs a full line in (`set`, `way`) and marks it valid.
    ///
    /// `data` must hold exactly one line of words; shorter input leaves the tail unchanged.
    pub fn update(&mut self, set: usize, way: usize, tag: u32, data: &[u32], dirty: bool) {
        let slot = self.slot(set, way);
        let start = self.word_index(set, way, 0);
        let len = data.len().min(self.geometry.line_words());
        self.data[start..start + len].copy_from_slice(&data[..len]);
        self.tags[slot] = tag;
        self.valid[slot] = true;
        self.dirty[slot] = dirty;
    }

    /// Clears the valid and dirty bits of one way.
    pub fn invalidate(&mut self, set: usize, way: usize) {
        let slot = self.slot(set, way);
        self.valid[slot] = false;
        self.dirty[slot] = false;
    }

    /// Clears every valid bit and returns recency state to reset.
    ///
    /// Dirty data is dropped, not written back.
    pub fn invalidate_all(&mut self) {
        self.valid.fill(false);
        self.dirty.fill(false);
        self.policy.reset();
    }

    /// Returns `true` if (`set`, `way`) holds a valid line.
    pub fn is_valid(&self, set: usize, way: usize) -> bool {
        self.valid[self.slot(set, way)]
    }

    /// Returns `true` if (`set`, `way`) holds a valid, modified line.
    pub fn is_dirty(&self, set: usize, way: usize) -> bool {
        let slot = self.slot(set, way);
        self.valid[slot] && self.dirty[slot]
    }

    /// Returns the tag stored in (`set`, `way`), valid or not.
    pub fn tag(&self, set: usize, way: usize) -> u32 {
        self.tags[self.slot(set, way)]
    }

    /// Chooses the way a new line in `set` will replace.
    ///
    /// Ways whose bit is set in `pending` are already promised to an
    /// outstanding miss and are never chosen. Among the rest, the lowest
    /// invalid way wins; otherwise the LRU way (ties to the lowest index).
    /// Returns `None` when every way is pending.
    pub fn select_victim(&self, set: usize, pending: u32) -> Option<usize> {
        let eligible = !pending & way_mask(self.geometry.ways);
        (0..self.geometry.ways)
            .find(|&way| eligible & (1 << way) != 0 && !self.is_valid(set, way))
            .or_else(|| self.policy.victim(set, eligible))
    }

    /// Marks (`set`, `way`) most recently used.
    pub fn touch(&mut self, set: usize, way: usize) {
        self.policy.update(set, way);
    }

    /// Returns the recency state of `set`.
    pub fn lru_state(&self, set: usize) -> Option<LruState> {
        self.policy.state(set)
    }
}

/// Bit mask with one bit per way.
const fn way_mask(ways: usize) -> u32 {
    if ways >= 32 { u32::MAX } else { (1 << ways) - 1 }
}

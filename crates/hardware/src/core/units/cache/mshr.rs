//! Miss Status Holding Registers (MSHR).
//!
//! The MSHR file tracks every cache line with an outstanding miss. It provides:
//! 1. **Allocation:** A new entry per missed line, or coalescing into an existing one.
//! 2. **Matching:** Associative search by line address, merging requested words into the entry mask.
//! 3. **Targets:** The ordered list of reads and writes waiting for the line.
//! 4. **Retirement:** Freeing an entry once its line is installed.
//!
//! At most one valid entry exists per line address. Entries are numbered by
//! slot index; the lowest free slot is always allocated first.

use tracing::{debug, trace};

use crate::common::{CacheGeometry, Stall};
use crate::core::units::lsu::load_queue::LoadId;

/// Identifier of an MSHR slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MshrId(pub usize);

/// Progress of an outstanding miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MshrState {
    /// Waiting for the memory port.
    Allocated,
    /// Granted; the dirty victim is being written back.
    AwaitingWriteback,
    /// Granted; the line is being fetched.
    AwaitingFetch,
    /// The line is complete and is being installed.
    ReadyToRetire,
}

/// One operation waiting on a missed line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MshrTarget {
    /// A load of one word, answered with a tagged completion.
    Read {
        /// Word index within the line.
        word: usize,
        /// Load queue tag of the requester.
        tag: LoadId,
    },
    /// A byte-enabled store merged over the fetched data.
    Write {
        /// Word index within the line.
        word: usize,
        /// Lane-positioned store data.
        data: u32,
        /// Bytes to write.
        byte_enable: u8,
    },
}

/// State of one valid MSHR slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MshrEntry {
    /// Line-aligned address of the missed line.
    pub line_addr: u32,
    /// Bit *w* set when word *w* of the line has been requested.
    pub word_mask: u32,
    /// Way the line will be installed into, once chosen.
    pub victim_way: Option<usize>,
    /// Progress of the miss.
    pub state: MshrState,
    /// Allocation sequence number; lower is older.
    pub seq: u64,
    /// Line address currently held by the victim way, if valid.
    pub evict_line: Option<u32>,
    /// Coalesced operations in arrival order.
    pub targets: Vec<MshrTarget>,
}

/// Simultaneous port activity for one MSHR cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MshrStep {
    /// Allocation request: (address, word offset).
    pub allocate: Option<(u32, usize)>,
    /// Match request: (address, word offset).
    pub matching: Option<(u32, usize)>,
    /// Slot to free.
    pub retire: Option<MshrId>,
}

/// What one `MshrFile::step` observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MshrStepOutcome {
    /// Result of the allocation port, if it was driven.
    pub allocated: Option<Result<MshrId, Stall>>,
    /// Hit of the match port, evaluated before the step took effect.
    pub matched: Option<MshrId>,
}

/// The file of miss status holding registers.
#[derive(Debug)]
pub struct MshrFile {
    entries: Vec<Option<MshrEntry>>,
    geometry: CacheGeometry,
    next_seq: u64,
}

impl MshrFile {
    /// Creates a file with `capacity` empty slots.
    pub fn new(capacity: usize, geometry: CacheGeometry) -> Self {
        Self {
            entries: vec![None; capacity],
            geometry,
            next_seq: 0,
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Returns `true` when no miss is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    /// Returns `true` when every slot is valid.
    pub fn is_full(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }

    /// Bit *i* set when slot *i* is valid.
    pub fn valid_mask(&self) -> u64 {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .fold(0, |mask, (i, _)| mask | (1u64 << i))
    }

    /// Returns the entry in slot `id`, if valid.
    pub fn get(&self, id: MshrId) -> Option<&MshrEntry> {
        self.entries.get(id.0)?.as_ref()
    }

    /// Iterates over valid entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (MshrId, &MshrEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (MshrId(i), e)))
    }

    /// Frees every slot.
    pub fn reset(&mut self) {
        self.entries.fill(None);
        self.next_seq = 0;
    }

    /// Associative search for the line containing `addr`; lowest slot wins.
    pub fn find(&self, addr: u32) -> Option<MshrId> {
        let line = self.geometry.line_addr(addr);
        self.iter()
            .find(|(_, e)| e.line_addr == line)
            .map(|(id, _)| id)
    }

    /// Searches for the line containing `addr` and merges `word` into its mask.
    pub fn match_request(&mut self, addr: u32, word: usize) -> Option<MshrId> {
        let id = self.find(addr)?;
        if let Some(entry) = self.slot_mut(id) {
            entry.word_mask |= word_bit(word);
            trace!(mshr = id.0, line = entry.line_addr, word, mask = entry.word_mask, "mshr match");
        }
        Some(id)
    }

    /// Allocates an entry for the line containing `addr`, or coalesces into an existing one.
    ///
    /// Coalescing is accepted even when the file is full.
    ///
    /// # Errors
    ///
    /// Returns [`Stall::MshrFull`] when every slot is valid and none tracks the line.
    pub fn allocate(&mut self, addr: u32, word: usize) -> Result<MshrId, Stall> {
        if let Some(id) = self.match_request(addr, word) {
            return Ok(id);
        }
        let Some(slot) = self.entries.iter().position(Option::is_none) else {
            debug!(addr, "mshr full");
            return Err(Stall::MshrFull);
        };
        let line_addr = self.geometry.line_addr(addr);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries[slot] = Some(MshrEntry {
            line_addr,
            word_mask: word_bit(word),
            victim_way: None,
            state: MshrState::Allocated,
            seq,
            evict_line: None,
            targets: Vec::new(),
        });
        debug!(mshr = slot, line = line_addr, word, seq, "mshr allocate");
        Ok(MshrId(slot))
    }

    /// Frees slot `id`. Retiring an invalid slot does nothing.
    pub fn retire(&mut self, id: MshrId) {
        if let Some(entry) = self.entries.get_mut(id.0).and_then(Option::take) {
            debug!(mshr = id.0, line = entry.line_addr, "mshr retire");
        }
    }

    /// Performs one cycle with all ports driven simultaneously.
    ///
    /// The match port reads the state as it was before the step. Retirement is
    /// applied after the match updates the mask, so it wins for the same slot.
    /// Allocation runs last and may reuse a slot freed by the retirement.
    pub fn step(&mut self, step: MshrStep) -> MshrStepOutcome {
        let matched = step
            .matching
            .and_then(|(addr, word)| self.match_request(addr, word));
        if let Some(id) = step.retire {
            self.retire(id);
        }
        let allocated = step.allocate.map(|(addr, word)| self.allocate(addr, word));
        MshrStepOutcome { allocated, matched }
    }

    /// Records the way the line will replace and the line it evicts.
    pub fn assign_victim(&mut self, id: MshrId, way: usize, evict_line: Option<u32>) {
        if let Some(entry) = self.slot_mut(id) {
            entry.victim_way = Some(way);
            entry.evict_line = evict_line;
        }
    }

    /// Moves entry `id` to `state`.
    pub fn set_state(&mut self, id: MshrId, state: MshrState) {
        if let Some(entry) = self.slot_mut(id) {
            entry.state = state;
        }
    }

    /// Appends a waiting operation to entry `id`.
    pub fn push_target(&mut self, id: MshrId, target: MshrTarget) {
        if let Some(entry) = self.slot_mut(id) {
            entry.targets.push(target);
        }
    }

    /// Bit *w* set when way *w* of `set` is the victim of a valid entry.
    pub fn pending_ways(&self, set: usize) -> u32 {
        self.iter()
            .filter(|(_, e)| self.geometry.set_index(e.line_addr) == set)
            .filter_map(|(_, e)| e.victim_way)
            .fold(0, |mask, way| mask | (1 << way))
    }

    /// Returns the entry evicting the line containing `addr`, if any.
    pub fn evicting(&self, addr: u32) -> Option<MshrId> {
        let line = self.geometry.line_addr(addr);
        self.iter()
            .find(|(_, e)| e.evict_line == Some(line))
            .map(|(id, _)| id)
    }

    fn slot_mut(&mut self, id: MshrId) -> Option<&mut MshrEntry> {
        self.entries.get_mut(id.0)?.as_mut()
    }
}

fn word_bit(word: usize) -> u32 {
    1u32.checked_shl(word as u32).unwrap_or(0)
}

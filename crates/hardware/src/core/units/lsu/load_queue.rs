//! Load Queue.
//!
//! The load queue tracks every load from issue until its value is handed back
//! to the pipeline. It provides:
//! 1. **Allocation:** A slot per load in program order; the slot index is the load's tag.
//! 2. **Fill:** Data arrives in any order, tagged with the slot it belongs to.
//! 3. **In-order Dequeue:** Only the oldest load may leave, and only once filled.
//! 4. **Flush:** Squashed loads keep their slot until their data arrives, then vanish.
//!
//! Holding a squashed slot until its fill arrives guarantees that a late
//! tagged response never lands in a slot that has been reused.

use tracing::trace;

use crate::common::Stall;
use crate::common::data::{MemWidth, extract_load};

/// Tag of a load queue slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(pub usize);

/// A load ready for writeback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadResult {
    /// Tag the load was issued with.
    pub tag: LoadId,
    /// Destination register.
    pub rd: u8,
    /// Byte address of the load.
    pub addr: u32,
    /// Sign- or zero-extended value.
    pub value: u32,
}

/// A single entry in the load queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadQueueEntry {
    /// Whether this slot is occupied.
    pub valid: bool,
    /// Destination register.
    pub rd: u8,
    /// Byte address.
    pub addr: u32,
    /// Access width.
    pub width: MemWidth,
    /// Sign-extend narrow loads.
    pub signed: bool,
    /// Data has arrived.
    pub filled: bool,
    /// Squashed by a flush; discarded instead of dequeued.
    pub squashed: bool,
    /// Extended load value, once filled.
    pub result: u32,
}

/// Load queue: circular buffer of in-flight loads.
#[derive(Debug)]
pub struct LoadQueue {
    entries: Vec<LoadQueueEntry>,
    /// Index of the oldest entry.
    head: usize,
    /// Index where the next entry will be allocated.
    tail: usize,
    /// Number of valid entries.
    count: usize,
}

impl LoadQueue {
    /// Creates a new load queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![LoadQueueEntry::default(); capacity.max(1)],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of occupied entries, squashed ones included.
    #[inline]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the queue is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if the queue is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Number of occupied entries that have not been squashed.
    pub fn live_len(&self) -> usize {
        self.occupied().filter(|&i| !self.entries[i].squashed).count()
    }

    /// Returns the tag the next `enqueue` will assign.
    pub const fn next_id(&self) -> LoadId {
        LoadId(self.tail)
    }

    /// Returns the entry for `id`, if occupied.
    pub fn get(&self, id: LoadId) -> Option<&LoadQueueEntry> {
        self.entries.get(id.0).filter(|e| e.valid)
    }

    /// Allocates a slot for a load in program order.
    ///
    /// # Errors
    ///
    /// Returns [`Stall::LoadQueueFull`] when no slot is free.
    pub fn enqueue(&mut self, addr: u32, rd: u8, width: MemWidth, signed: bool) -> Result<LoadId, Stall> {
        if self.is_full() {
            return Err(Stall::LoadQueueFull);
        }
        let id = LoadId(self.tail);
        self.entries[self.tail] = LoadQueueEntry {
            valid: true,
            rd,
            addr,
            width,
            signed,
            filled: false,
            squashed: false,
            result: 0,
        };
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        Ok(id)
    }

    /// Delivers the raw word containing the load's address.
    ///
    /// The addressed bytes are extracted and extended. Fills for free or
    /// already filled slots are ignored.
    pub fn fill(&mut self, id: LoadId, word: u32) {
        if let Some(entry) = self.pending_mut(id) {
            entry.result = extract_load(word, entry.addr, entry.width, entry.signed);
            entry.filled = true;
            trace!(tag = id.0, addr = entry.addr, value = entry.result, "load filled");
        }
    }

    /// Delivers an already extended value (store-to-load forwarding).
    pub fn fill_value(&mut self, id: LoadId, value: u32) {
        if let Some(entry) = self.pending_mut(id) {
            entry.result = value;
            entry.filled = true;
        }
    }

    /// Removes the oldest load if its data has arrived.
    ///
    /// Squashed loads at the head are discarded on the way.
    pub fn dequeue(&mut self) -> Option<LoadResult> {
        self.reclaim_squashed();
        let entry = self.entries[self.head];
        if self.count == 0 || !entry.filled {
            return None;
        }
        let result = LoadResult {
            tag: LoadId(self.head),
            rd: entry.rd,
            addr: entry.addr,
            value: entry.result,
        };
        self.pop_head();
        Some(result)
    }

    /// Frees squashed loads at the head whose data has arrived.
    pub fn reclaim_squashed(&mut self) {
        while self.count > 0 {
            let head = &self.entries[self.head];
            if !(head.squashed && head.filled) {
                break;
            }
            trace!(tag = self.head, "squashed load discarded");
            self.pop_head();
        }
    }

    /// Squashes every occupied entry.
    ///
    /// Unfilled entries keep their slot until their data arrives.
    pub fn flush(&mut self) {
        let slots: Vec<usize> = self.occupied().collect();
        for i in slots {
            self.entries[i].squashed = true;
        }
        self.reclaim_squashed();
    }

    /// Empties the queue unconditionally.
    pub fn reset(&mut self) {
        self.entries.fill(LoadQueueEntry::default());
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    fn pop_head(&mut self) {
        self.entries[self.head].valid = false;
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
    }

    fn pending_mut(&mut self, id: LoadId) -> Option<&mut LoadQueueEntry> {
        self.entries
            .get_mut(id.0)
            .filter(|e| e.valid && !e.filled)
    }

    fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        let cap = self.entries.len();
        (0..self.count).map(move |i| (self.head + i) % cap)
    }
}

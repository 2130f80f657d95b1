//! Store Queue.
//!
//! Stores wait here from issue until the cache accepts them. The store queue provides:
//! 1. **Allocation:** A slot per store in program order, with lane-positioned data.
//! 2. **Forwarding:** Younger loads read pending store data without touching the cache.
//! 3. **Retirement:** The oldest store leaves when the cache accepts its write.

use tracing::trace;

use crate::common::Stall;
use crate::common::addr::word_addr;
use crate::common::data::{MemWidth, extract_load, store_lanes};

/// Result of store-to-load forwarding check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardResult {
    /// Store fully covers the load; carries the extended load value.
    Hit(u32),
    /// No overlap with any pending store; safe to read from the cache.
    Miss,
    /// Partial overlap; must stall until the store drains.
    Stall,
}

/// A single entry in the store queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreQueueEntry {
    /// Whether this slot is occupied.
    pub valid: bool,
    /// Byte address as issued.
    pub addr: u32,
    /// Lane-positioned data: byte *i* of the word at bits `8i..8i+8`.
    pub data: u32,
    /// Bytes written.
    pub byte_enable: u8,
}

/// Store queue: FIFO of stores not yet accepted by the cache.
#[derive(Debug)]
pub struct StoreQueue {
    entries: Vec<StoreQueueEntry>,
    /// Index of the oldest entry.
    head: usize,
    /// Index where the next entry will be allocated.
    tail: usize,
    /// Number of valid entries.
    count: usize,
}

impl StoreQueue {
    /// Creates a new store queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![StoreQueueEntry::default(); capacity.max(1)],
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

    /// Returns the number of occupied entries.
    #[inline]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the store queue is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if the store queue is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Appends a store with lane-positioned `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Stall::StoreQueueFull`] when no slot is free.
    pub fn enqueue(&mut self, addr: u32, data: u32, byte_enable: u8) -> Result<(), Stall> {
        if self.is_full() {
            return Err(Stall::StoreQueueFull);
        }
        self.entries[self.tail] = StoreQueueEntry {
            valid: true,
            addr,
            data,
            byte_enable,
        };
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        trace!(addr, data, byte_enable, "store queued");
        Ok(())
    }

    /// Appends an `SB`/`SH`/`SW` of the low bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Stall::StoreQueueFull`] when no slot is free.
    pub fn enqueue_store(&mut self, addr: u32, value: u32, width: MemWidth) -> Result<(), Stall> {
        let (data, byte_enable) = store_lanes(addr, value, width);
        self.enqueue(addr, data, byte_enable)
    }

    /// The oldest store, if any.
    pub fn head(&self) -> Option<&StoreQueueEntry> {
        (self.count > 0).then(|| &self.entries[self.head])
    }

    /// Removes the oldest store after the cache accepted its write.
    pub fn retire_head(&mut self) -> Option<StoreQueueEntry> {
        if self.count == 0 {
            return None;
        }
        let retired = self.entries[self.head];
        self.entries[self.head].valid = false;
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
        Some(retired)
    }

    /// Attempts store-to-load forwarding.
    ///
    /// The youngest store touching any byte of the load decides: `Hit` if it
    /// covers every loaded byte, `Stall` if it covers only some, `Miss` if no
    /// pending store overlaps.
    pub fn forward(&self, addr: u32, width: MemWidth, signed: bool) -> ForwardResult {
        let load_be = width.byte_enable(addr);
        let word = word_addr(addr);
        for entry in self.newest_first() {
            let overlap = entry.byte_enable & load_be;
            if word_addr(entry.addr) != word || overlap == 0 {
                continue;
            }
            if overlap == load_be {
                return ForwardResult::Hit(extract_load(entry.data, addr, width, signed));
            }
            return ForwardResult::Stall;
        }
        ForwardResult::Miss
    }

    /// Returns the value from the youngest store that fully covers the load.
    ///
    /// Partially overlapping stores are skipped rather than reported; use
    /// [`StoreQueue::forward`] when partial overlap must stall the load.
    pub fn forward_lookup(&self, addr: u32, width: MemWidth, signed: bool) -> Option<u32> {
        let load_be = width.byte_enable(addr);
        let word = word_addr(addr);
        self.newest_first()
            .find(|e| word_addr(e.addr) == word && e.byte_enable & load_be == load_be)
            .map(|e| extract_load(e.data, addr, width, signed))
    }

    /// Empties the queue.
    pub fn reset(&mut self) {
        self.entries.fill(StoreQueueEntry::default());
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }

    fn newest_first(&self) -> impl Iterator<Item = &StoreQueueEntry> + '_ {
        let cap = self.entries.len();
        (0..self.count).map(move |i| &self.entries[(self.tail + cap - 1 - i) % cap])
    }
}

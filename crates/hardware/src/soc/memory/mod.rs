//! Physical System Memory.
//!
//! This module implements the memory behind the cache's backend port. It provides:
//! 1. **Memory:** `MainMemory`, sparse word-addressed backing storage (unwritten words read as zero).
//! 2. **Controller:** Latency modeling (simple or DRAM row-buffer) for timing simulation.
//! 3. **Backend:** The `MemoryBackend` port protocol and its latency-modeled implementation.

/// Backend port protocol and latency-modeled implementation.
pub mod backend;

/// Memory controller implementations for access latency modeling.
pub mod controller;

use std::collections::HashMap;

use crate::common::addr::word_addr;
use crate::common::data::merge_bytes;

/// Sparse main memory, addressed in 32-bit words.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MainMemory {
    words: HashMap<u32, u32>,
}

impl MainMemory {
    /// Creates an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the word containing `addr`.
    pub fn read_word(&self, addr: u32) -> u32 {
        self.words.get(&word_addr(addr)).copied().unwrap_or(0)
    }

    /// Writes the word containing `addr`.
    pub fn write_word(&mut self, addr: u32, value: u32) {
        let _ = self.words.insert(word_addr(addr), value);
    }

    /// Writes the enabled bytes of `data` into the word containing `addr`.
    pub fn write_bytes(&mut self, addr: u32, data: u32, byte_enable: u8) {
        let merged = merge_bytes(self.read_word(addr), data, byte_enable);
        self.write_word(addr, merged);
    }

    /// Reads `count` consecutive words starting at `addr`.
    pub fn read_words(&self, addr: u32, count: usize) -> Vec<u32> {
        (0..count as u32)
            .map(|i| self.read_word(addr.wrapping_add(i * 4)))
            .collect()
    }

    /// Writes consecutive words starting at `addr`.
    pub fn load(&mut self, addr: u32, data: &[u32]) {
        for (i, &word) in data.iter().enumerate() {
            self.write_word(addr.wrapping_add(i as u32 * 4), word);
        }
    }

    /// Number of words ever written.
    pub fn footprint(&self) -> usize {
        self.words.len()
    }
}

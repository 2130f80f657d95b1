//! Cache Address Geometry.
//!
//! This module decomposes 32-bit physical addresses for a set-associative cache.
//! It provides the following:
//! 1. **Field Extraction:** Tag, set index, word offset, and byte offset of an address.
//! 2. **Line Addressing:** Line-aligned addresses and reconstruction from (tag, set).
//! 3. **Validation:** Geometry is only built from configurations that passed validation,
//!    so every size is a power of two and every shift is exact.

use super::constants::{WORD_BYTES, WORD_SHIFT};

/// Geometry of a set-associative cache.
///
/// Address layout (most significant first): `tag | set index | word offset | byte offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheGeometry {
    /// Number of sets.
    pub sets: usize,
    /// Associativity (ways per set).
    pub ways: usize,
    /// Line size in bytes.
    pub line_bytes: usize,
    offset_bits: u32,
    set_bits: u32,
}

impl CacheGeometry {
    /// Builds a geometry from a set count, associativity, and line size.
    ///
    /// # Arguments
    ///
    /// * `sets` - Number of sets (power of two).
    /// * `ways` - Ways per set.
    /// * `line_bytes` - Line size in bytes (power of two, at least one word).
    pub fn new(sets: usize, ways: usize, line_bytes: usize) -> Self {
        Self {
            sets,
            ways,
            line_bytes,
            offset_bits: line_bytes.trailing_zeros(),
            set_bits: sets.trailing_zeros(),
        }
    }

    /// Returns the number of 32-bit words in one line.
    #[inline]
    pub fn line_words(&self) -> usize {
        self.line_bytes / WORD_BYTES
    }

    /// Returns the set index selected by `addr`.
    #[inline]
    pub fn set_index(&self, addr: u32) -> usize {
        ((addr >> self.offset_bits) as usize) & (self.sets - 1)
    }

    /// Returns the tag of `addr`.
    #[inline]
    pub fn tag(&self, addr: u32) -> u32 {
        addr.checked_shr(self.offset_bits + self.set_bits)
            .unwrap_or(0)
    }

    /// Returns `addr` with the word and byte offsets cleared.
    #[inline]
    pub fn line_addr(&self, addr: u32) -> u32 {
        addr & !((self.line_bytes as u32) - 1)
    }

    /// Returns the index of the word within its line.
    #[inline]
    pub fn word_offset(&self, addr: u32) -> usize {
        ((addr as usize) & (self.line_bytes - 1)) >> WORD_SHIFT
    }

    /// Reconstructs the line address held by (`tag`, `set`).
    #[inline]
    pub fn line_addr_of(&self, tag: u32, set: usize) -> u32 {
        let high = tag.checked_shl(self.offset_bits + self.set_bits).unwrap_or(0);
        high | ((set as u32) << self.offset_bits)
    }
}

/// Returns `addr` rounded down to a word boundary.
#[inline]
pub const fn word_addr(addr: u32) -> u32 {
    addr & !((WORD_BYTES as u32) - 1)
}

/// Returns the byte offset of `addr` within its word.
#[inline]
pub const fn byte_offset(addr: u32) -> u32 {
    addr & ((WORD_BYTES as u32) - 1)
}

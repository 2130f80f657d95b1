//! Global Model Constants.
//!
//! This module defines the constants shared by the cache, the queues, and the
//! backend port. It includes:
//! 1. **Word Constants:** Word size and the byte-enable mask of a full word.
//! 2. **Structural Limits:** Upper bounds checked by configuration validation.

/// Size of a machine word in bytes (RV32).
pub const WORD_BYTES: usize = 4;

/// Number of bits to shift to convert between bytes and words.
pub const WORD_SHIFT: u32 = 2;

/// Byte-enable mask covering all four lanes of a word.
pub const FULL_WORD_MASK: u8 = 0b1111;

/// Largest supported associativity; bounds the fixed-size LRU age vector.
pub const MAX_WAYS: usize = 16;

/// Largest supported line size in words; bounds the MSHR word mask (`u32`).
pub const MAX_LINE_WORDS: usize = 32;

/// Largest supported MSHR file; bounds the valid bitmap (`u64`).
pub const MAX_MSHRS: usize = 64;

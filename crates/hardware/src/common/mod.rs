//! Common utilities and types used throughout the memory subsystem model.
//!
//! This module provides the building blocks shared by every component. It includes:
//! 1. **Address Geometry:** Decomposition of 32-bit addresses into tag, set, word, and byte fields.
//! 2. **Constants:** Word size, byte-enable masks, and structural limits.
//! 3. **Access Widths:** RISC-V load/store widths, byte lanes, and sign/zero extension.
//! 4. **Error Handling:** Structural stall conditions and configuration errors.

/// Address decomposition for a set-associative cache.
pub mod addr;

/// Common constants used throughout the model.
pub mod constants;

/// Access widths, byte lanes, and load extension.
pub mod data;

/// Stall and error types.
pub mod error;

pub use addr::CacheGeometry;
pub use constants::{FULL_WORD_MASK, WORD_BYTES};
pub use data::MemWidth;
pub use error::{ConfigError, Stall};

//! Memory units.
//!
//! This module contains the data cache (storage, MSHRs, arbiter, controller)
//! and the load/store unit with its load and store queues.

/// Non-blocking data cache with MSHRs and LRU replacement.
pub mod cache;

/// Load/Store Unit with load and store queues.
pub mod lsu;

//! Non-blocking RV32 L1 data-memory subsystem model.
//!
//! This crate implements a cycle-level model of the data side of a pipelined
//! RISC-V core with the following:
//! 1. **Cache:** Set-associative write-back, write-allocate data cache with LRU replacement.
//! 2. **Misses:** MSHR file with coalescing, a port arbiter, and a refill state machine
//!    supporting hit-under-miss and miss-under-miss.
//! 3. **Queues:** Load queue (out-of-order fill, in-order dequeue) and store queue
//!    (store-to-load forwarding, in-order retirement).
//! 4. **Memory:** Latency-modeled backend port over sparse main memory.
//! 5. **Simulation:** Configuration, trace replay, and statistics collection.

/// Common types and constants (address geometry, access widths, stalls).
pub mod common;
/// Model configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Data cache and load/store unit.
pub mod core;
/// Simulator and trace replay.
pub mod sim;
/// Main memory, latency controllers, and the backend port.
pub mod soc;
/// Statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or `Config::from_json`.
pub use crate::config::Config;
/// Load/store unit; pipeline-facing entry point of the model.
pub use crate::core::units::lsu::LoadStoreUnit;
/// Top-level simulator built from a `Config`.
pub use crate::sim::Simulator;

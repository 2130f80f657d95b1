//! Stall and Error definitions.
//!
//! This module defines the error handling vocabulary of the memory subsystem. It provides:
//! 1. **Structural Stalls:** Every condition under which a component answers `ready = 0`.
//!    Stalls are never fatal; the caller holds the request and retries on a later cycle.
//! 2. **Configuration Errors:** Geometry and sizing problems found while validating a `Config`.

use thiserror::Error;

/// A structural stall: the request was not accepted this cycle.
///
/// Corresponds to the `ready = 0` handshake. Nothing is modified when a stall is
/// returned, so retrying the identical request later is always safe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum Stall {
    /// Every MSHR is valid and none tracks the requested line.
    #[error("MSHR file full with no coalescing match")]
    MshrFull,

    /// The load queue has no free slot.
    #[error("load queue full")]
    LoadQueueFull,

    /// The store queue has no free slot.
    #[error("store queue full")]
    StoreQueueFull,

    /// The requested line is being written back or replaced by an in-flight refill.
    ///
    /// The associated value is the line address.
    #[error("line {0:#010x} is being evicted")]
    EvictionInFlight(u32),

    /// Every way of the set is the victim of a pending MSHR.
    ///
    /// The associated value is the set index.
    #[error("no evictable way in set {0}")]
    SetBusy(usize),

    /// The single cache request port was already used this cycle.
    #[error("cache port busy")]
    PortBusy,

    /// A younger store overlaps the load only partially; the load waits for it to drain.
    ///
    /// The associated value is the load address.
    #[error("partial store overlap at {0:#010x}")]
    ForwardConflict(u32),
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A size or count that must be a power of two is not.
    #[error("{field} must be a power of two, got {value}")]
    NotPowerOfTwo {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: usize,
    },

    /// A value lies outside its supported range.
    #[error("{field} must be in {min}..={max}, got {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// Two fields are individually valid but inconsistent with each other.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),

    /// The JSON document could not be parsed.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

//! Core-side memory components.
//!
//! This module contains the units that sit between the pipeline and the
//! memory port: the non-blocking data cache and the load/store unit.

/// Execution units (data cache, load/store unit).
pub mod units;

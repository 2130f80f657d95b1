//! System-on-Chip (SoC) Components.
//!
//! This module organizes the memory side of the model: the backing main
//! memory, its latency controllers, and the backend port the cache drives.

/// Main memory, latency controllers, and backend port.
pub mod memory;

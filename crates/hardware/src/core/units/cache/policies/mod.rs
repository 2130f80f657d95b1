//! Cache Replacement Policies.
//!
//! Implements the algorithm for selecting victim lines in the set-associative data cache.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used, as a per-set age vector.
//!
//! Victim selection is restricted by an eligibility mask: ways that are the
//! victim of an outstanding miss must never be chosen a second time.

/// Least Recently Used replacement policy.
pub mod lru;

pub use lru::{LruPolicy, LruState};

/// Trait for cache replacement policies.
///
/// Defines the interface for updating usage state and selecting victim lines.
pub trait ReplacementPolicy: Send + Sync {
    /// Updates the policy state when a line is accessed or filled.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `way` - The way index within the set that was accessed.
    fn update(&mut self, set: usize, way: usize);

    /// Selects a victim line among the eligible ways of a set.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `eligible` - Bit *w* set when way *w* may be evicted.
    ///
    /// # Returns
    ///
    /// The index of the way to evict, or `None` if no way is eligible.
    fn victim(&self, set: usize, eligible: u32) -> Option<usize>;

    /// Returns every set to its power-on state.
    fn reset(&mut self);
}

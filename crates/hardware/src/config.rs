//! Configuration system for the memory subsystem model.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the model. It provides:
//! 1. **Defaults:** Baseline hardware constants (cache geometry, MSHR count, queue depths, memory timing).
//! 2. **Structures:** Hierarchical config for general, cache, MSHR, queue, and memory settings.
//! 3. **Validation:** Geometry checks performed before any component is built.
//!
//! Configuration is supplied via JSON (`Config::from_json`) or use `Config::default()` for the CLI.

use serde::{Deserialize, Serialize};

use crate::common::CacheGeometry;
use crate::common::constants::{MAX_LINE_WORDS, MAX_MSHRS, MAX_WAYS, WORD_BYTES};
use crate::common::error::ConfigError;

/// Default configuration constants for the model.
///
/// These values define the baseline hardware configuration when not
/// explicitly overridden in JSON configuration files.
mod defaults {
    /// Default cache size in bytes (4 KiB).
    pub const CACHE_SIZE: usize = 4096;

    /// Default cache line size in bytes (64 bytes, sixteen words).
    pub const CACHE_LINE: usize = 64;

    /// Default cache associativity (4 ways, giving 16 sets).
    pub const CACHE_WAYS: usize = 4;

    /// Default number of MSHR entries.
    pub const MSHR_ENTRIES: usize = 8;

    /// Default load queue depth.
    pub const LOAD_QUEUE_DEPTH: usize = 8;

    /// Default store queue depth.
    pub const STORE_QUEUE_DEPTH: usize = 8;

    /// Fixed access latency of the simple memory controller in cycles.
    pub const MEMORY_LATENCY: u64 = 10;

    /// CAS (Column Access Strobe) latency in DRAM cycles.
    ///
    /// Time from column address assertion to data availability for reads.
    pub const T_CAS: u64 = 14;

    /// RAS (Row Access Strobe) latency in DRAM cycles.
    ///
    /// Time required to activate a DRAM row before column access.
    pub const T_RAS: u64 = 14;

    /// Precharge latency in DRAM cycles.
    ///
    /// Time required to close an active row before opening a new one.
    pub const T_PRE: u64 = 14;

    /// Bytes moved per backend beat (a whole default line: single wide transfer).
    pub const BEAT_BYTES: usize = 64;
}

/// Memory controller implementation types.
///
/// Specifies the timing model placed behind the backend port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Simple fixed-latency memory controller.
    ///
    /// All memory accesses take a fixed number of cycles regardless
    /// of address patterns or row buffer state.
    #[default]
    Simple,
    /// DRAM controller with row buffer modeling.
    ///
    /// Models DRAM timing including CAS, RAS, and precharge latencies
    /// so that accesses to an open row are cheaper than row switches.
    #[serde(alias = "DRAM")]
    Dram,
}

/// Top-level configuration structure for the memory subsystem.
///
/// Every section may be omitted; missing sections and fields take their defaults.
///
/// # Examples
///
/// ```
/// use rvmem_core::config::{Config, MemoryController};
///
/// let json = r#"{
///     "cache": { "size_bytes": 8192, "ways": 2 },
///     "mshr": { "entries": 4 },
///     "memory": { "controller": "Dram", "beat_bytes": 16 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.cache.line_bytes, 64);
/// assert_eq!(config.geometry().sets, 64);
/// assert_eq!(config.mshr.entries, 4);
/// assert_eq!(config.memory.controller, MemoryController::Dram);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// General simulation settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// L1 data cache geometry
    #[serde(default)]
    pub cache: CacheConfig,
    /// Miss status holding registers
    #[serde(default)]
    pub mshr: MshrConfig,
    /// Load and store queue depths
    #[serde(default)]
    pub queues: QueueConfig,
    /// Backend memory port and timing
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Config {
    /// Parses a configuration from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the document is malformed and any
    /// validation error reported by [`Config::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// A narrow-bus configuration: 16-byte lines transferred as four 4-byte beats.
    ///
    /// Architecturally identical to the default configuration; only the
    /// number of backend beats per line differs.
    pub fn narrow_burst() -> Self {
        Self {
            cache: CacheConfig {
                line_bytes: 16,
                ..CacheConfig::default()
            },
            memory: MemoryConfig {
                beat_bytes: 4,
                ..MemoryConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the cache geometry derived from the `cache` section.
    ///
    /// Only meaningful for a configuration that passed [`Config::validate`].
    pub fn geometry(&self) -> CacheGeometry {
        let sets = self.cache.size_bytes / (self.cache.line_bytes * self.cache.ways).max(1);
        CacheGeometry::new(sets.max(1), self.cache.ways, self.cache.line_bytes)
    }

    /// Number of 32-bit words moved per backend beat.
    pub const fn beat_words(&self) -> usize {
        self.memory.beat_bytes / WORD_BYTES
    }

    /// Checks every size and count for consistency.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        power_of_two("cache.line_bytes", cache.line_bytes)?;
        in_range(
            "cache.line_bytes",
            cache.line_bytes,
            WORD_BYTES,
            MAX_LINE_WORDS * WORD_BYTES,
        )?;
        in_range("cache.ways", cache.ways, 1, MAX_WAYS)?;
        power_of_two("cache.size_bytes", cache.size_bytes)?;

        let way_bytes = cache.line_bytes * cache.ways;
        if cache.size_bytes < way_bytes || cache.size_bytes % way_bytes != 0 {
            return Err(ConfigError::Inconsistent(format!(
                "cache.size_bytes ({}) is not a multiple of line_bytes * ways ({way_bytes})",
                cache.size_bytes
            )));
        }
        power_of_two("cache sets", cache.size_bytes / way_bytes)?;

        in_range("mshr.entries", self.mshr.entries, 1, MAX_MSHRS)?;
        in_range("queues.load_queue_depth", self.queues.load_queue_depth, 1, 1024)?;
        in_range("queues.store_queue_depth", self.queues.store_queue_depth, 1, 1024)?;

        power_of_two("memory.beat_bytes", self.memory.beat_bytes)?;
        in_range(
            "memory.beat_bytes",
            self.memory.beat_bytes,
            WORD_BYTES,
            cache.line_bytes,
        )?;
        Ok(())
    }
}

fn power_of_two(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ConfigError::NotPowerOfTwo { field, value })
    }
}

fn in_range(field: &'static str, value: usize, min: usize, max: usize) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// General simulation settings and options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Emit a per-access line for every trace operation (in addition to `tracing` output)
    #[serde(default)]
    pub trace: bool,
}

/// L1 data cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Total cache size in bytes
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,

    /// Cache line size in bytes
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity (number of ways)
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,
}

impl CacheConfig {
    /// Returns the default cache size in bytes.
    fn default_size() -> usize {
        defaults::CACHE_SIZE
    }

    /// Returns the default cache line size in bytes.
    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    /// Returns the default associativity.
    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::CACHE_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::CACHE_WAYS,
        }
    }
}

/// MSHR file configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MshrConfig {
    /// Number of outstanding line misses that can be tracked
    #[serde(default = "MshrConfig::default_entries")]
    pub entries: usize,
}

impl MshrConfig {
    fn default_entries() -> usize {
        defaults::MSHR_ENTRIES
    }
}

impl Default for MshrConfig {
    fn default() -> Self {
        Self {
            entries: defaults::MSHR_ENTRIES,
        }
    }
}

/// Load and store queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Load queue entries
    #[serde(default = "QueueConfig::default_load_depth")]
    pub load_queue_depth: usize,

    /// Store queue entries
    #[serde(default = "QueueConfig::default_store_depth")]
    pub store_queue_depth: usize,
}

impl QueueConfig {
    fn default_load_depth() -> usize {
        defaults::LOAD_QUEUE_DEPTH
    }

    fn default_store_depth() -> usize {
        defaults::STORE_QUEUE_DEPTH
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            load_queue_depth: defaults::LOAD_QUEUE_DEPTH,
            store_queue_depth: defaults::STORE_QUEUE_DEPTH,
        }
    }
}

/// Backend memory configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Memory controller type
    #[serde(default)]
    pub controller: MemoryController,

    /// Access latency of the simple controller
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// CAS latency (column access strobe)
    #[serde(default = "MemoryConfig::default_t_cas")]
    pub t_cas: u64,

    /// RAS latency (row access strobe)
    #[serde(default = "MemoryConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency
    #[serde(default = "MemoryConfig::default_t_pre")]
    pub t_pre: u64,

    /// Bytes per backend beat; equal to the line size for a single wide transfer
    #[serde(default = "MemoryConfig::default_beat_bytes")]
    pub beat_bytes: usize,

    /// When greater than one, the port only accepts requests one cycle in every `ready_period`
    #[serde(default)]
    pub ready_period: u64,
}

impl MemoryConfig {
    /// Returns the default simple-controller latency.
    fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    /// Returns the default CAS latency in DRAM cycles.
    fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    /// Returns the default RAS latency in DRAM cycles.
    fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    /// Returns the default precharge latency in DRAM cycles.
    fn default_t_pre() -> u64 {
        defaults::T_PRE
    }

    /// Returns the default beat width in bytes.
    fn default_beat_bytes() -> usize {
        defaults::BEAT_BYTES
    }
}

impl Default for MemoryConfig {
    /// Creates a default memory configuration.
    ///
    /// Uses the simple memory controller with single-beat line transfers
    /// and a port that is always ready.
    fn default() -> Self {
        Self {
            controller: MemoryController::default(),
            latency: defaults::MEMORY_LATENCY,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            beat_bytes: defaults::BEAT_BYTES,
            ready_period: 0,
        }
    }
}

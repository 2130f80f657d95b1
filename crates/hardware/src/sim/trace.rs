//! Access Traces.
//!
//! A trace is a JSON document describing initial memory contents and a
//! program-ordered list of memory operations:
//!
//! ```json
//! {
//!     "memory": [ { "addr": 4096, "words": [1, 2, 3] } ],
//!     "ops": [
//!         { "op": "store", "addr": 4096, "value": 255, "width": "byte" },
//!         { "op": "load", "addr": 4096, "rd": 5, "width": "byte", "signed": true },
//!         { "op": "idle", "cycles": 20 },
//!         { "op": "flush" },
//!         { "op": "fence" }
//!     ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::common::ConfigError;
use crate::common::data::MemWidth;
use crate::soc::memory::MainMemory;

/// Errors raised while loading or replaying a trace.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be read.
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    /// The trace is not valid JSON or does not match the schema.
    #[error("invalid trace: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration used for replay is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The model did not drain within the cycle limit.
    #[error("trace did not complete within {cycles} cycles")]
    Timeout {
        /// Cycles simulated before giving up.
        cycles: u64,
    },
}

/// Initial contents for a run of consecutive words.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MemoryInit {
    /// Address of the first word.
    pub addr: u32,
    /// Word values.
    pub words: Vec<u32>,
}

/// One operation in program order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceOp {
    /// A load into register `rd`.
    Load {
        /// Byte address.
        addr: u32,
        /// Destination register.
        #[serde(default)]
        rd: u8,
        /// Access width.
        #[serde(default)]
        width: MemWidth,
        /// Sign-extend narrow loads.
        #[serde(default)]
        signed: bool,
    },
    /// A store of the low bits of `value`.
    Store {
        /// Byte address.
        addr: u32,
        /// Value to store.
        value: u32,
        /// Access width.
        #[serde(default)]
        width: MemWidth,
    },
    /// Let cycles pass without issuing anything.
    Idle {
        /// Cycles to wait.
        cycles: u64,
    },
    /// Pipeline flush: squash queued loads.
    Flush,
    /// Invalidate the data cache.
    Fence,
}

/// A complete trace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Trace {
    /// Initial memory contents.
    #[serde(default)]
    pub memory: Vec<MemoryInit>,
    /// Operations in program order.
    #[serde(default)]
    pub ops: Vec<TraceOp>,
}

impl Trace {
    /// Parses a trace from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Parse`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a trace file.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the file cannot be read and
    /// [`TraceError::Parse`] if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Writes the trace's initial contents into `memory`; other words are untouched.
    pub fn load_memory(&self, memory: &mut MainMemory) {
        for init in &self.memory {
            memory.load(init.addr, &init.words);
        }
    }
}

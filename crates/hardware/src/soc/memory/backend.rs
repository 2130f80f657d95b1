//! Backend Memory Port.
//!
//! The cache reaches memory through one valid/ready port. This module defines:
//! 1. **Protocol:** `MemRequest` (line read or single-beat write) and `MemBeat` (read data).
//! 2. **Trait:** `MemoryBackend`, the handshake the refill engine drives every cycle.
//! 3. **Implementation:** `LatencyBackend`, main memory behind a latency-modeling controller
//!    with optional back-pressure.
//!
//! A refused request (`try_request` returning `false`) has no effect; the
//! requester keeps it asserted and retries on a later cycle.

use std::collections::VecDeque;

use tracing::trace;

use super::MainMemory;
use super::controller::{self, MemoryController};
use crate::common::WORD_BYTES;
use crate::config::Config;

/// A request presented on the backend port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemRequest {
    /// Fetch a whole line; answered with `line_words / beat_words` beats.
    Read {
        /// Line-aligned address.
        line_addr: u32,
    },
    /// Write one beat of a line.
    Write {
        /// Beat-aligned address.
        addr: u32,
        /// Beat data, `beat_words` words.
        data: Vec<u32>,
    },
}

/// One beat of read data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemBeat {
    /// Address of the first word of the beat.
    pub addr: u32,
    /// Beat data, `beat_words` words.
    pub data: Vec<u32>,
}

/// The cache's view of the memory port.
pub trait MemoryBackend {
    /// Presents a request for this cycle. Returns `true` if it was accepted.
    fn try_request(&mut self, request: &MemRequest) -> bool;

    /// Takes the next read beat if one is available this cycle.
    fn poll_response(&mut self) -> Option<MemBeat>;

    /// Advances the backend by one cycle.
    fn tick(&mut self);

    /// Drops every response still in flight. Memory contents are kept.
    fn reset(&mut self);
}

#[derive(Debug)]
struct PendingBeat {
    ready_at: u64,
    beat: MemBeat,
}

/// Main memory behind a latency-modeling controller.
///
/// Reads are answered after the controller's latency, one beat per cycle.
/// Writes update memory when accepted.
#[derive(Debug)]
pub struct LatencyBackend {
    memory: MainMemory,
    controller: Box<dyn MemoryController>,
    beat_words: usize,
    line_words: usize,
    cycle: u64,
    ready_period: u64,
    ready_override: Option<bool>,
    pending: VecDeque<PendingBeat>,
}

impl LatencyBackend {
    /// Creates a backend over `memory` with the given controller and transfer sizes.
    pub fn new(
        memory: MainMemory,
        controller: Box<dyn MemoryController>,
        line_words: usize,
        beat_words: usize,
    ) -> Self {
        Self {
            memory,
            controller,
            beat_words: beat_words.clamp(1, line_words.max(1)),
            line_words,
            cycle: 0,
            ready_period: 0,
            ready_override: None,
            pending: VecDeque::new(),
        }
    }

    /// Builds the backend described by the `memory` and `cache` sections of `config`.
    pub fn from_config(config: &Config, memory: MainMemory) -> Self {
        let mut backend = Self::new(
            memory,
            controller::build(&config.memory),
            config.cache.line_bytes / WORD_BYTES,
            config.beat_words(),
        );
        backend.ready_period = config.memory.ready_period;
        backend
    }

    /// Forces the ready signal high or low, or returns it to the periodic pattern with `None`.
    pub const fn set_ready(&mut self, ready: Option<bool>) {
        self.ready_override = ready;
    }

    /// Accepts requests only one cycle in every `period` (0 or 1 means always ready).
    pub const fn set_ready_period(&mut self, period: u64) {
        self.ready_period = period;
    }

    /// Returns the ready signal for the current cycle.
    pub const fn is_ready(&self) -> bool {
        match self.ready_override {
            Some(ready) => ready,
            None => self.ready_period <= 1 || self.cycle % self.ready_period == 0,
        }
    }

    /// Backing memory contents.
    pub const fn memory(&self) -> &MainMemory {
        &self.memory
    }

    /// Mutable backing memory, for preloading test data.
    pub const fn memory_mut(&mut self) -> &mut MainMemory {
        &mut self.memory
    }

    /// Cycles elapsed.
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns `true` when no read data is still in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl MemoryBackend for LatencyBackend {
    fn try_request(&mut self, request: &MemRequest) -> bool {
        if !self.is_ready() {
            return false;
        }
        match request {
            MemRequest::Read { line_addr } => {
                let line = self.memory.read_words(*line_addr, self.line_words);
                let timing = self
                    .controller
                    .read_line(*line_addr, line.len().div_ceil(self.beat_words));
                for (i, chunk) in line.chunks(self.beat_words).enumerate() {
                    let addr = line_addr.wrapping_add((i * self.beat_words * WORD_BYTES) as u32);
                    self.pending.push_back(PendingBeat {
                        ready_at: self.cycle + timing.beat_ready(i),
                        beat: MemBeat {
                            addr,
                            data: chunk.to_vec(),
                        },
                    });
                }
                trace!(
                    line = *line_addr,
                    first_beat = timing.first_beat,
                    done = timing.line_ready(),
                    "backend read accepted"
                );
            }
            MemRequest::Write { addr, data } => {
                self.controller.write_beat(*addr);
                self.memory.load(*addr, data);
                trace!(addr = *addr, words = data.len(), "backend write accepted");
            }
        }
        true
    }

    fn poll_response(&mut self) -> Option<MemBeat> {
        if self.pending.front()?.ready_at > self.cycle {
            return None;
        }
        self.pending.pop_front().map(|p| p.beat)
    }

    fn tick(&mut self) {
        self.cycle += 1;
    }

    fn reset(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        self.controller.reset();
        trace!(dropped, "backend reset");
    }
}

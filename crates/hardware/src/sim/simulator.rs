//! Simulator: owns the load/store unit and its backend.
//!
//! The simulator builds every component from a validated `Config` and provides
//! cycle stepping, draining, and trace replay on top of the `LoadStoreUnit`.

use tracing::{debug, info};

use super::trace::{Trace, TraceError, TraceOp};
use crate::common::{ConfigError, Stall};
use crate::config::Config;
use crate::core::units::lsu::LoadStoreUnit;
use crate::core::units::lsu::load_queue::LoadResult;
use crate::soc::memory::MainMemory;
use crate::soc::memory::backend::LatencyBackend;
use crate::stats::MemStats;

/// Upper bound on cycles spent waiting for one operation or for the final drain.
pub const DEFAULT_CYCLE_LIMIT: u64 = 1_000_000;

/// What a trace replay produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Loads in the order the pipeline received them.
    pub loads: Vec<LoadResult>,
    /// Cycles simulated.
    pub cycles: u64,
}

/// Top-level simulator: load/store unit over a latency-modeled memory.
#[derive(Debug)]
pub struct Simulator {
    /// Load/store unit, data cache, and backend port.
    pub lsu: LoadStoreUnit<LatencyBackend>,
    config: Config,
    cycle_limit: u64,
}

impl Simulator {
    /// Creates a simulator over empty memory.
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error, if any.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_memory(config, MainMemory::new())
    }

    /// Creates a simulator over the given memory contents.
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error, if any.
    pub fn with_memory(config: &Config, memory: MainMemory) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = config.geometry();
        let backend = LatencyBackend::from_config(config, memory);
        let lsu = LoadStoreUnit::new(
            geometry,
            config.mshr.entries,
            config.beat_words(),
            config.queues.load_queue_depth,
            config.queues.store_queue_depth,
            backend,
        );
        debug!(
            sets = geometry.sets,
            ways = geometry.ways,
            line_bytes = geometry.line_bytes,
            mshrs = config.mshr.entries,
            "simulator built"
        );
        Ok(Self {
            lsu,
            config: config.clone(),
            cycle_limit: DEFAULT_CYCLE_LIMIT,
        })
    }

    /// Sets the cycle bound used by `drain` and `replay`.
    pub const fn set_cycle_limit(&mut self, cycles: u64) {
        self.cycle_limit = cycles;
    }

    /// Configuration the simulator was built with.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Counters collected so far.
    pub const fn stats(&self) -> &MemStats {
        self.lsu.stats()
    }

    /// Advances the simulator by one clock cycle.
    pub fn tick(&mut self) {
        self.lsu.tick();
    }

    /// Ticks until the unit is quiescent, collecting loads as they dequeue.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Timeout`] if work is still outstanding after the cycle limit.
    pub fn drain(&mut self, loads: &mut Vec<LoadResult>) -> Result<(), TraceError> {
        let start = self.stats().cycles;
        loop {
            while let Some(load) = self.lsu.dequeue() {
                loads.push(load);
            }
            if self.lsu.is_quiescent() {
                return Ok(());
            }
            if self.stats().cycles - start >= self.cycle_limit {
                return Err(TraceError::Timeout {
                    cycles: self.stats().cycles,
                });
            }
            self.tick();
        }
    }

    /// Replays `trace` in program order and drains the unit.
    ///
    /// Each operation is retried every cycle until accepted. The trace's
    /// memory image is loaded into the backend first.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Timeout`] if an operation is never accepted or the
    /// final drain does not finish within the cycle limit.
    pub fn replay(&mut self, trace: &Trace) -> Result<ReplayReport, TraceError> {
        trace.load_memory(self.lsu.backend_mut().memory_mut());
        let start = self.stats().cycles;
        let mut loads = Vec::new();

        for op in &trace.ops {
            let issued_at = self.stats().cycles;
            loop {
                match self.issue(*op) {
                    Ok(()) => break,
                    Err(stall) => {
                        if self.stats().cycles - issued_at >= self.cycle_limit {
                            debug!(?op, %stall, "operation never accepted");
                            return Err(TraceError::Timeout {
                                cycles: self.stats().cycles,
                            });
                        }
                    }
                }
                self.tick();
                while let Some(load) = self.lsu.dequeue() {
                    loads.push(load);
                }
            }
            self.tick();
            while let Some(load) = self.lsu.dequeue() {
                loads.push(load);
            }
        }

        self.drain(&mut loads)?;
        let cycles = self.stats().cycles - start;
        info!(ops = trace.ops.len(), loads = loads.len(), cycles, "replay complete");
        Ok(ReplayReport { loads, cycles })
    }

    fn issue(&mut self, op: TraceOp) -> Result<(), Stall> {
        let result = match op {
            TraceOp::Load {
                addr,
                rd,
                width,
                signed,
            } => self.lsu.issue_load(addr, rd, width, signed).map(|_| ()),
            TraceOp::Store { addr, value, width } => self.lsu.issue_store(addr, value, width),
            TraceOp::Idle { cycles } => {
                for _ in 0..cycles {
                    self.tick();
                }
                Ok(())
            }
            TraceOp::Flush => {
                self.lsu.flush();
                Ok(())
            }
            TraceOp::Fence => {
                self.lsu.fence();
                Ok(())
            }
        };
        if self.config.general.trace {
            eprintln!("[{:>8}] {op:?} -> {result:?}", self.stats().cycles);
        }
        result
    }
}

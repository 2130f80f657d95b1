//! Backend Timing Models.
//!
//! The backend asks its timing model when each beat of a line read becomes
//! available, and tells it about every write beat it accepts:
//! 1. **Fixed:** `SimpleController`, a constant delay before the first beat.
//! 2. **Row Buffer:** `DramController`, which keeps one row open. Line reads and
//!    writeback beats both move the open row, so a dirty victim in another row
//!    makes the following fetch pay for a precharge.
//!
//! After the first beat, the rest of a burst streams one beat per cycle.

use crate::config::{MemoryConfig, MemoryController as ControllerKind};

/// Arrival schedule of a line read, relative to the cycle it was accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BurstTiming {
    /// Cycles until the first beat.
    pub first_beat: u64,
    /// Number of beats in the burst.
    pub beats: usize,
}

impl BurstTiming {
    /// Cycles after acceptance at which beat `index` is available.
    pub const fn beat_ready(&self, index: usize) -> u64 {
        self.first_beat + index as u64
    }

    /// Cycles after acceptance at which the whole line has arrived.
    pub const fn line_ready(&self) -> u64 {
        self.beat_ready(if self.beats == 0 { 0 } else { self.beats - 1 })
    }
}

/// Timing model behind the backend port.
pub trait MemoryController: Send + Sync + std::fmt::Debug {
    /// Schedules a read of the line at `line_addr`, returned as `beats` beats.
    fn read_line(&mut self, line_addr: u32, beats: usize) -> BurstTiming;

    /// Notes an accepted write beat at `addr`.
    fn write_beat(&mut self, addr: u32);

    /// Forgets any open state.
    fn reset(&mut self);
}

/// Builds the timing model selected by `config.controller`.
pub fn build(config: &MemoryConfig) -> Box<dyn MemoryController> {
    match config.controller {
        ControllerKind::Simple => Box::new(SimpleController::new(config.latency)),
        ControllerKind::Dram => Box::new(DramController::new(config.t_cas, config.t_ras, config.t_pre)),
    }
}

/// Every line read waits `latency` cycles for its first beat.
#[derive(Debug)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// A fixed-delay model.
    pub const fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl MemoryController for SimpleController {
    fn read_line(&mut self, _line_addr: u32, beats: usize) -> BurstTiming {
        BurstTiming {
            first_beat: self.latency,
            beats,
        }
    }

    fn write_beat(&mut self, _addr: u32) {}

    fn reset(&mut self) {}
}

/// Single-bank row-buffer model.
///
/// A read to the open row costs `t_cas`; opening a row when none is open adds
/// `t_ras`; switching rows adds `t_pre + t_ras`.
#[derive(Debug)]
pub struct DramController {
    open_row: Option<u32>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
}

impl DramController {
    /// Bytes per row; every cache line lies within one row.
    pub const ROW_BYTES: u32 = 2048;

    /// A row-buffer model with every row closed.
    pub const fn new(t_cas: u64, t_ras: u64, t_pre: u64) -> Self {
        Self {
            open_row: None,
            t_cas,
            t_ras,
            t_pre,
        }
    }

    /// Row currently held in the row buffer.
    pub const fn open_row(&self) -> Option<u32> {
        self.open_row
    }

    const fn row_of(addr: u32) -> u32 {
        addr / Self::ROW_BYTES
    }

    /// Moves the row buffer to the row of `addr`; returns the activation cost.
    const fn activate(&mut self, addr: u32) -> u64 {
        let row = Self::row_of(addr);
        let cost = match self.open_row {
            Some(open) if open == row => 0,
            Some(_) => self.t_pre + self.t_ras,
            None => self.t_ras,
        };
        self.open_row = Some(row);
        cost
    }
}

impl MemoryController for DramController {
    fn read_line(&mut self, line_addr: u32, beats: usize) -> BurstTiming {
        BurstTiming {
            first_beat: self.activate(line_addr) + self.t_cas,
            beats,
        }
    }

    fn write_beat(&mut self, addr: u32) {
        let _ = self.activate(addr);
    }

    fn reset(&mut self) {
        self.open_row = None;
    }
}

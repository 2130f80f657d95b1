//! Backend Timing Model Tests.

use pretty_assertions::assert_eq;
use rvmem_core::config::{MemoryConfig, MemoryController as ControllerKind};
use rvmem_core::soc::memory::controller::{
    self, BurstTiming, DramController, MemoryController, SimpleController,
};

const ROW: u32 = DramController::ROW_BYTES;

#[test]
fn simple_delay_ignores_address() {
    let mut ctrl = SimpleController::new(7);
    assert_eq!(ctrl.read_line(0x0000, 1).first_beat, 7);
    ctrl.write_beat(0x8000);
    assert_eq!(ctrl.read_line(0xFFFF_0000, 4).first_beat, 7);
}

#[test]
fn burst_streams_one_beat_per_cycle() {
    let timing = BurstTiming {
        first_beat: 5,
        beats: 4,
    };
    let ready: Vec<u64> = (0..4).map(|i| timing.beat_ready(i)).collect();
    assert_eq!(ready, vec![5, 6, 7, 8]);
    assert_eq!(timing.line_ready(), 8);
}

/// First read opens a row; reads in the same row pay CAS only; a new row adds precharge.
#[test]
fn dram_row_buffer_timing() {
    let mut ctrl = DramController::new(2, 3, 5);
    assert_eq!(ctrl.open_row(), None);
    assert_eq!(ctrl.read_line(0x0000, 1).first_beat, 3 + 2);
    assert_eq!(ctrl.read_line(0x0040, 1).first_beat, 2);
    assert_eq!(ctrl.read_line(ROW - 0x40, 1).first_beat, 2);
    assert_eq!(ctrl.read_line(ROW, 1).first_beat, 5 + 3 + 2);
    assert_eq!(ctrl.read_line(ROW + 0x80, 1).first_beat, 2);
    assert_eq!(ctrl.open_row(), Some(1));
}

/// A writeback to another row moves the row buffer, so the next fetch reopens its row.
#[test]
fn dram_writeback_moves_open_row() {
    let mut ctrl = DramController::new(2, 3, 5);
    let _ = ctrl.read_line(0x1000, 4);
    for beat in 0..4 {
        ctrl.write_beat(ROW * 4 + beat * 4);
    }
    assert_eq!(ctrl.open_row(), Some(4));
    assert_eq!(ctrl.read_line(0x1040, 4).first_beat, 5 + 3 + 2);
}

#[test]
fn dram_reset_closes_row() {
    let mut ctrl = DramController::new(2, 3, 5);
    let _ = ctrl.read_line(0x0000, 1);
    ctrl.reset();
    assert_eq!(ctrl.open_row(), None);
    assert_eq!(ctrl.read_line(0x0000, 1).first_beat, 3 + 2);
}

#[test]
fn build_follows_configured_kind() {
    let mut config = MemoryConfig {
        latency: 4,
        ..MemoryConfig::default()
    };
    assert_eq!(controller::build(&config).read_line(0x1000, 1).first_beat, 4);

    config.controller = ControllerKind::Dram;
    let mut dram = controller::build(&config);
    assert_eq!(dram.read_line(0x1000, 1).first_beat, config.t_ras + config.t_cas);
    assert_eq!(dram.read_line(0x1040, 1).first_beat, config.t_cas);
}

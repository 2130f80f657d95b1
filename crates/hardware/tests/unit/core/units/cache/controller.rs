//! Cache Controller Tests.
//!
//! Drives the controller directly against a backend: hits and misses,
//! coalescing, write-allocate, LRU eviction, dirty writeback ordering,
//! structural stalls, back-pressure, and invalidation during a refill.

use pretty_assertions::assert_eq;
use rvmem_core::common::{Stall, WORD_BYTES};
use rvmem_core::config::Config;
use rvmem_core::core::units::cache::controller::{
    Accepted, CacheController, CacheRequest, CacheResponse, Completion, RefillState,
};
use rvmem_core::core::units::lsu::load_queue::LoadId;
use rvmem_core::soc::memory::MainMemory;
use rvmem_core::stats::CacheCounters;
use rvmem_core::soc::memory::backend::{LatencyBackend, MemBeat, MemRequest, MemoryBackend};

use crate::common::harness::{CYCLE_LIMIT, init_tracing};
use crate::common::mocks::{MockBackend, RecordingBackend};

type Port = RecordingBackend<LatencyBackend>;

fn setup(config: &Config) -> (CacheController, Port) {
    init_tracing();
    let ctrl = CacheController::new(config.geometry(), config.mshr.entries, config.beat_words());
    let backend = RecordingBackend::new(LatencyBackend::from_config(config, MainMemory::new()));
    (ctrl, backend)
}

fn step<B: MemoryBackend>(ctrl: &mut CacheController, backend: &mut B) -> Vec<Completion> {
    let completions = ctrl.tick(backend);
    backend.tick();
    completions
}

fn settle<B: MemoryBackend>(ctrl: &mut CacheController, backend: &mut B) -> Vec<Completion> {
    let mut completions = Vec::new();
    for _ in 0..CYCLE_LIMIT {
        if ctrl.is_idle() {
            return completions;
        }
        completions.extend(step(ctrl, backend));
    }
    panic!("controller never went idle");
}

fn read(addr: u32, tag: usize) -> CacheRequest {
    CacheRequest::read(addr, LoadId(tag))
}

/// Fills `addr`'s line through a miss and waits for the install.
fn fill(ctrl: &mut CacheController, backend: &mut Port, addr: u32) {
    assert!(matches!(ctrl.request(&read(addr, 0)), Ok(Accepted::Miss(_))));
    let _ = settle(ctrl, backend);
}

// ══════════════════════════════════════════════════════════
// 1. Hits and misses
// ══════════════════════════════════════════════════════════

#[test]
fn miss_then_hit() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x1000, &[10, 11, 12, 13]);

    let result = ctrl.request(&read(0x1008, 4));
    assert!(matches!(result, Ok(Accepted::Miss(_))));
    let response = CacheResponse::from_result(&result);
    assert!(response.ready && !response.resp_valid);

    assert_eq!(
        settle(&mut ctrl, &mut backend),
        vec![Completion {
            tag: LoadId(4),
            word: 12
        }]
    );
    assert_eq!(ctrl.request(&read(0x100C, 0)), Ok(Accepted::Hit(13)));
    assert_eq!(backend.reads(), vec![0x1000]);
    assert_eq!(ctrl.counters().hits, 1);
    assert_eq!(ctrl.counters().misses, 1);
}

/// The refill engine walks grant, fetch issue, beat, install.
#[test]
fn refill_state_progression() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    let Ok(Accepted::Miss(id)) = ctrl.request(&read(0x1000, 0)) else {
        panic!("expected a miss");
    };
    assert_eq!(ctrl.refill_state(), RefillState::Idle);

    let _ = step(&mut ctrl, &mut backend);
    assert_eq!(ctrl.arbiter().grant(), Some(id));
    assert_eq!(
        ctrl.refill_state(),
        RefillState::Fetch {
            mshr: id,
            issued: false,
            received: 0
        }
    );
    let _ = step(&mut ctrl, &mut backend);
    assert!(matches!(ctrl.refill_state(), RefillState::Fetch { issued: true, .. }));

    let completions = settle(&mut ctrl, &mut backend);
    assert_eq!(completions.len(), 1);
    assert!(ctrl.arbiter().is_idle());
    assert!(ctrl.mshrs().is_empty());
}

#[test]
fn secondary_misses_coalesce_into_one_fetch() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x2000, &(100..116).collect::<Vec<u32>>());

    for (tag, word) in [(0, 3), (1, 0), (2, 15), (3, 3)] {
        assert!(matches!(
            ctrl.request(&read(0x2000 + word * 4, tag)),
            Ok(Accepted::Miss(_))
        ));
    }
    assert_eq!(ctrl.mshrs().len(), 1);
    let (_, entry) = ctrl.mshrs().iter().next().unwrap();
    assert_eq!(entry.word_mask, (1 << 0) | (1 << 3) | (1 << 15));

    let words: Vec<(usize, u32)> = settle(&mut ctrl, &mut backend)
        .into_iter()
        .map(|c| (c.tag.0, c.word))
        .collect();
    assert_eq!(words, vec![(0, 103), (1, 100), (2, 115), (3, 103)]);
    assert_eq!(backend.reads(), vec![0x2000]);
    assert_eq!(ctrl.counters().coalesced, 3);
}

/// Two concurrently outstanding misses never corrupt each other's lines.
#[test]
fn concurrent_misses_keep_their_own_data() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x1000, &[0xA; 16]);
    backend.inner.memory_mut().load(0x2040, &[0xB; 16]);

    assert!(ctrl.request(&read(0x1000, 0)).is_ok());
    let _ = step(&mut ctrl, &mut backend);
    assert!(ctrl.request(&read(0x207C, 1)).is_ok());
    assert_eq!(ctrl.mshrs().len(), 2);

    let completions = settle(&mut ctrl, &mut backend);
    assert_eq!(
        completions,
        vec![
            Completion {
                tag: LoadId(0),
                word: 0xA
            },
            Completion {
                tag: LoadId(1),
                word: 0xB
            },
        ]
    );
    for word in 0..16 {
        let offset = (word * WORD_BYTES) as u32;
        assert_eq!(ctrl.request(&read(0x1000 + offset, 0)), Ok(Accepted::Hit(0xA)));
        assert_eq!(ctrl.request(&read(0x2040 + offset, 0)), Ok(Accepted::Hit(0xB)));
    }
}

// ══════════════════════════════════════════════════════════
// 2. Writes
// ══════════════════════════════════════════════════════════

/// Write-allocate: a one-byte write over an all-ones refill reads back 0xFFFFFF78.
#[test]
fn write_allocate_merges_over_refill() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x3000, &[0xFFFF_FFFF; 16]);

    let write = CacheRequest::write(0x3000, 0x1234_5678, 0b0001);
    assert!(matches!(ctrl.request(&write), Ok(Accepted::Miss(_))));
    assert!(matches!(ctrl.request(&read(0x3000, 7)), Ok(Accepted::Miss(_))));

    assert_eq!(
        settle(&mut ctrl, &mut backend),
        vec![Completion {
            tag: LoadId(7),
            word: 0xFFFF_FF78
        }]
    );
    assert_eq!(ctrl.request(&read(0x3000, 0)), Ok(Accepted::Hit(0xFFFF_FF78)));
    assert_eq!(ctrl.request(&read(0x3004, 0)), Ok(Accepted::Hit(0xFFFF_FFFF)));
    let set = ctrl.storage().geometry().set_index(0x3000);
    assert!((0..4).any(|way| ctrl.storage().is_dirty(set, way)));
}

/// A read queued before a write sees the refill data, not the write.
#[test]
fn targets_apply_in_arrival_order() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x3000, &[1]);

    assert!(ctrl.request(&read(0x3000, 0)).is_ok());
    assert!(ctrl.request(&CacheRequest::write(0x3000, 2, 0b1111)).is_ok());
    assert!(ctrl.request(&read(0x3000, 1)).is_ok());

    let words: Vec<u32> = settle(&mut ctrl, &mut backend)
        .iter()
        .map(|c| c.word)
        .collect();
    assert_eq!(words, vec![1, 2]);
}

#[test]
fn store_hit_returns_updated_word() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x3000, &[0xAABB_CCDD]);
    fill(&mut ctrl, &mut backend, 0x3000);
    assert_eq!(
        ctrl.request(&CacheRequest::write(0x3002, 0x1122_0000, 0b1100)),
        Ok(Accepted::Hit(0x1122_CCDD))
    );
}

#[test]
fn zero_byte_enable_write_is_a_no_op() {
    let (mut ctrl, _backend) = setup(&Config::default());
    assert_eq!(
        ctrl.request(&CacheRequest::write(0x5000, 0xFFFF_FFFF, 0)),
        Ok(Accepted::Hit(0))
    );
    assert!(ctrl.mshrs().is_empty());
    assert!(!ctrl.storage().contains(0x5000));
}

// ══════════════════════════════════════════════════════════
// 3. Replacement and writeback
// ══════════════════════════════════════════════════════════

/// Lines 0x0000, 0x0400, 0x0800, 0x0C00 fill set 0; 0x1000 evicts 0x0000.
#[test]
fn fifth_line_evicts_lru() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    for addr in [0x0000, 0x0400, 0x0800, 0x0C00, 0x1000] {
        fill(&mut ctrl, &mut backend, addr);
    }
    let resident: Vec<bool> = [0x0000, 0x0400, 0x0800, 0x0C00, 0x1000]
        .iter()
        .map(|&a| ctrl.storage().contains(a))
        .collect();
    assert_eq!(resident, vec![false, true, true, true, true]);
    assert_eq!(ctrl.counters().misses, 5);
}

#[test]
fn hit_refreshes_recency() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    for addr in [0x0000, 0x0400, 0x0800, 0x0C00] {
        fill(&mut ctrl, &mut backend, addr);
    }
    assert!(matches!(ctrl.request(&read(0x0000, 0)), Ok(Accepted::Hit(_))));
    fill(&mut ctrl, &mut backend, 0x1000);
    assert!(ctrl.storage().contains(0x0000));
    assert!(!ctrl.storage().contains(0x0400));
}

/// A dirty victim's full line is written back strictly before the fetch.
#[test]
fn dirty_eviction_writes_back_before_fetch() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    assert!(ctrl.request(&CacheRequest::write(0x0004, 0xAAAA_AAAA, 0b1111)).is_ok());
    let _ = settle(&mut ctrl, &mut backend);
    for addr in [0x0400, 0x0800, 0x0C00] {
        fill(&mut ctrl, &mut backend, addr);
    }
    backend.accepted.clear();

    fill(&mut ctrl, &mut backend, 0x1000);
    let mut line = vec![0; 16];
    line[1] = 0xAAAA_AAAA;
    assert_eq!(
        backend.accepted,
        vec![
            MemRequest::Write {
                addr: 0x0000,
                data: line
            },
            MemRequest::Read { line_addr: 0x1000 },
        ]
    );
    assert_eq!(backend.inner.memory().read_word(0x0004), 0xAAAA_AAAA);
    assert_eq!(ctrl.counters().writebacks, 1);
}

#[test]
fn clean_eviction_never_writes_back() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    for addr in [0x0000, 0x0400, 0x0800, 0x0C00, 0x1000, 0x1400] {
        fill(&mut ctrl, &mut backend, addr);
    }
    assert!(backend.writes().is_empty());
    assert_eq!(ctrl.counters().writebacks, 0);
}

/// With 4-byte beats the writeback is a four-beat burst, then the fetch.
#[test]
fn narrow_writeback_is_a_burst() {
    let config = Config::narrow_burst();
    let (mut ctrl, mut backend) = setup(&config);
    assert!(ctrl.request(&CacheRequest::write(0x0008, 0x55, 0b0001)).is_ok());
    let _ = settle(&mut ctrl, &mut backend);
    for addr in [0x0400, 0x0800, 0x0C00] {
        fill(&mut ctrl, &mut backend, addr);
    }
    backend.accepted.clear();

    fill(&mut ctrl, &mut backend, 0x1000);
    assert_eq!(backend.writes(), vec![0x0000, 0x0004, 0x0008, 0x000C]);
    assert_eq!(
        backend.accepted.last(),
        Some(&MemRequest::Read { line_addr: 0x1000 })
    );
    assert_eq!(backend.inner.memory().read_word(0x0008), 0x55);
    assert_eq!(ctrl.counters().write_beats, 4);
    assert_eq!(ctrl.counters().read_beats, 5 * 4);
}

// ══════════════════════════════════════════════════════════
// 4. Structural stalls
// ══════════════════════════════════════════════════════════

/// Once the victim is invalidated at grant, a miss to it waits for the refill.
#[test]
fn miss_to_evicting_line_stalls() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    for addr in [0x0000, 0x0400, 0x0800, 0x0C00] {
        fill(&mut ctrl, &mut backend, addr);
    }
    assert!(ctrl.request(&read(0x1000, 0)).is_ok());
    // Still resident until the refill engine takes the way.
    assert!(matches!(ctrl.request(&read(0x0000, 1)), Ok(Accepted::Hit(_))));

    let _ = step(&mut ctrl, &mut backend);
    assert_eq!(
        ctrl.request(&read(0x0010, 1)),
        Err(Stall::EvictionInFlight(0x0000))
    );
    assert_eq!(ctrl.counters().misses, 5);

    let _ = settle(&mut ctrl, &mut backend);
    assert!(matches!(ctrl.request(&read(0x0010, 1)), Ok(Accepted::Miss(_))));
}

#[test]
fn all_ways_pending_stalls_set() {
    let (mut ctrl, _backend) = setup(&Config::default());
    for (tag, addr) in [0x0000, 0x0400, 0x0800, 0x0C00].into_iter().enumerate() {
        assert!(ctrl.request(&read(addr, tag)).is_ok());
    }
    assert_eq!(ctrl.mshrs().pending_ways(0), 0b1111);
    assert_eq!(ctrl.request(&read(0x1000, 4)), Err(Stall::SetBusy(0)));
    // Other sets are unaffected.
    assert!(ctrl.request(&read(0x1040, 4)).is_ok());
}

#[test]
fn full_mshr_file_stalls_new_lines_only() {
    let (mut ctrl, _backend) = setup(&Config::default());
    for i in 0..8u32 {
        assert!(ctrl.request(&read(i * 0x40, i as usize)).is_ok());
    }
    assert_eq!(ctrl.request(&read(0x8 * 0x40, 8)), Err(Stall::MshrFull));
    assert!(matches!(ctrl.request(&read(0x0044, 8)), Ok(Accepted::Miss(_))));
    assert_eq!((ctrl.counters().misses, ctrl.counters().coalesced), (8, 1));
}

/// A stalled request leaves no trace.
#[test]
fn stall_modifies_nothing() {
    let (mut ctrl, _backend) = setup(&Config::default());
    for addr in [0x0000, 0x0400, 0x0800, 0x0C00] {
        assert!(ctrl.request(&read(addr, 0)).is_ok());
    }
    let mask = ctrl.mshrs().valid_mask();
    let _ = ctrl.request(&CacheRequest::write(0x1000, 1, 0b1111));
    assert_eq!(ctrl.mshrs().valid_mask(), mask);
    assert_eq!(ctrl.mshrs().find(0x1000), None);
}

// ══════════════════════════════════════════════════════════
// 5. Back-pressure
// ══════════════════════════════════════════════════════════

/// A backend refusing for many cycles never loses a transaction.
#[test]
fn long_refusal_loses_nothing() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x1000, &[42]);
    backend.inner.set_ready(Some(false));

    assert!(ctrl.request(&read(0x1000, 0)).is_ok());
    for _ in 0..300 {
        assert!(step(&mut ctrl, &mut backend).is_empty());
    }
    assert!(backend.accepted.is_empty());
    assert!(backend.refused >= 299);

    backend.inner.set_ready(None);
    let completions = settle(&mut ctrl, &mut backend);
    assert_eq!(completions.iter().map(|c| c.word).collect::<Vec<_>>(), vec![42]);
    assert_eq!(backend.reads(), vec![0x1000]);
    assert_eq!(ctrl.counters().backend_refusals, backend.refused);
}

#[test]
fn mock_backend_handshake() {
    let mut ctrl = CacheController::new(Config::default().geometry(), 2, 16);
    let mut backend = MockBackend::new();
    let mut refusals = 0;
    let _ = backend
        .expect_try_request()
        .withf(|r| matches!(r, MemRequest::Read { line_addr: 0x1000 }))
        .times(4)
        .returning(move |_| {
            refusals += 1;
            refusals > 3
        });
    let _ = backend
        .expect_poll_response()
        .times(1)
        .returning(|| Some(MemBeat {
            addr: 0x1000,
            data: (0..16).map(|w| w * 0x10).collect(),
        }));

    assert!(ctrl.request(&read(0x1024, 9)).is_ok());
    let mut completions = Vec::new();
    for _ in 0..7 {
        completions.extend(ctrl.tick(&mut backend));
    }
    assert_eq!(
        completions,
        vec![Completion {
            tag: LoadId(9),
            word: 0x90
        }]
    );
    assert_eq!(ctrl.counters().backend_refusals, 3);
    assert!(ctrl.is_idle());
}

/// A beat for some other line is discarded without counting toward the fill.
#[test]
fn beat_for_another_line_is_dropped() {
    let mut ctrl = CacheController::new(Config::default().geometry(), 2, 16);
    let mut backend = MockBackend::new();
    let _ = backend
        .expect_try_request()
        .withf(|r| matches!(r, MemRequest::Read { line_addr: 0x1000 }))
        .times(1)
        .return_const(true);
    let mut polls = 0;
    let _ = backend.expect_poll_response().times(2).returning(move || {
        polls += 1;
        let (addr, word) = if polls == 1 { (0x5000, 0xDEAD) } else { (0x1000, 7) };
        Some(MemBeat {
            addr,
            data: vec![word; 16],
        })
    });

    assert!(ctrl.request(&read(0x1004, 2)).is_ok());
    let mut completions = Vec::new();
    for _ in 0..4 {
        completions.extend(ctrl.tick(&mut backend));
    }
    assert!(completions.is_empty());
    assert!(matches!(ctrl.refill_state(), RefillState::UpdateCache { .. }));
    completions.extend(ctrl.tick(&mut backend));

    assert_eq!(completions, vec![Completion { tag: LoadId(2), word: 7 }]);
    assert_eq!(ctrl.counters().read_beats, 1);
}

#[test]
fn take_counters_starts_a_new_period() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    fill(&mut ctrl, &mut backend, 0x0000);
    let taken = ctrl.take_counters();
    assert_eq!((taken.misses, taken.fetches, taken.read_beats), (1, 1, 1));
    assert_eq!(*ctrl.counters(), CacheCounters::default());
}

// ══════════════════════════════════════════════════════════
// 6. Invalidation and reset
// ══════════════════════════════════════════════════════════

#[test]
fn invalidate_all_during_refill_still_installs() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    backend.inner.memory_mut().load(0x2000, &[5]);
    fill(&mut ctrl, &mut backend, 0x0000);
    assert!(ctrl.request(&read(0x2000, 3)).is_ok());
    let _ = step(&mut ctrl, &mut backend);
    let _ = step(&mut ctrl, &mut backend);

    ctrl.invalidate_all();
    assert!(!ctrl.storage().contains(0x0000));
    let completions = settle(&mut ctrl, &mut backend);
    assert_eq!(completions, vec![Completion { tag: LoadId(3), word: 5 }]);
    assert!(ctrl.storage().contains(0x2000));
}

#[test]
fn reset_drops_outstanding_misses() {
    let (mut ctrl, mut backend) = setup(&Config::default());
    fill(&mut ctrl, &mut backend, 0x0000);
    assert!(ctrl.request(&read(0x2000, 0)).is_ok());
    let _ = step(&mut ctrl, &mut backend);

    ctrl.reset();
    assert!(ctrl.is_idle());
    assert!(ctrl.arbiter().is_idle());
    assert!(!ctrl.storage().contains(0x0000));
}

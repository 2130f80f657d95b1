//! Cache Storage Tests.
//!
//! Exercises the tag/data/valid/dirty arrays directly: lookup, partial writes,
//! installs, invalidation, and victim selection with pending ways.

use rvmem_core::common::CacheGeometry;
use rvmem_core::core::units::cache::{CacheStorage, Lookup};

fn storage() -> CacheStorage {
    CacheStorage::new(CacheGeometry::new(16, 4, 64))
}

fn line(fill: u32) -> Vec<u32> {
    vec![fill; 16]
}

#[test]
fn installed_line_hits_in_its_way() {
    let mut cache = storage();
    let g = *cache.geometry();
    cache.update(g.set_index(0x1440), 2, g.tag(0x1440), &line(7), false);

    assert_eq!(cache.lookup(0x1440), Lookup::Hit(2));
    assert_eq!(cache.lookup(0x147C), Lookup::Hit(2));
    assert_eq!(cache.lookup(0x1480), Lookup::Miss);
    assert_eq!(cache.lookup(0x0440), Lookup::Miss);
    assert!(cache.contains(0x1444));
    assert_eq!(cache.read_word(1, 2, 15), 7);
    assert!(!cache.is_dirty(1, 2));
}

/// Write-then-read returns exactly the written bytes; other bytes keep refill data.
#[test]
fn partial_write_merges_and_dirties() {
    let mut cache = storage();
    cache.update(0, 0, 0, &line(0xFFFF_FFFF), false);
    cache.write_bytes(0, 0, 3, 0x1234_5678, 0b0001);
    assert_eq!(cache.read_word(0, 0, 3), 0xFFFF_FF78);
    assert_eq!(cache.read_word(0, 0, 2), 0xFFFF_FFFF);
    assert!(cache.is_dirty(0, 0));
    assert_eq!(cache.line_data(0, 0)[3], 0xFFFF_FF78);
}

#[test]
fn invalidate_clears_dirty() {
    let mut cache = storage();
    cache.update(3, 1, 5, &line(1), true);
    assert!(cache.is_dirty(3, 1));
    cache.invalidate(3, 1);
    assert!(!cache.is_valid(3, 1));
    assert!(!cache.is_dirty(3, 1));
    // The tag survives invalidation; only the valid bit is cleared.
    assert_eq!(cache.tag(3, 1), 5);
}

#[test]
fn invalidate_all_resets_recency() {
    let mut cache = storage();
    for way in 0..4 {
        cache.update(0, way, way as u32, &line(0), true);
        cache.touch(0, way);
    }
    cache.invalidate_all();
    assert!((0..4).all(|way| !cache.is_valid(0, way)));
    assert_eq!(cache.lru_state(0), storage().lru_state(0));
}

#[test]
fn victim_prefers_invalid_then_lru() {
    let mut cache = storage();
    for way in [2, 0, 3] {
        cache.update(0, way, way as u32, &line(0), false);
        cache.touch(0, way);
    }
    assert_eq!(cache.select_victim(0, 0), Some(1));

    cache.update(0, 1, 1, &line(0), false);
    cache.touch(0, 1);
    // Touch order 2, 0, 3, 1: way 2 is least recently used.
    assert_eq!(cache.select_victim(0, 0), Some(2));
    assert_eq!(cache.select_victim(0, 0b0100), Some(0));
    assert_eq!(cache.select_victim(0, 0b1111), None);
}

/// An invalid way that is already promised to a miss is not reused.
#[test]
fn pending_invalid_way_is_skipped() {
    let cache = storage();
    assert_eq!(cache.select_victim(4, 0b0001), Some(1));
    assert_eq!(cache.select_victim(4, 0b0111), Some(3));
}

//! Memory subsystem statistics collection and reporting.
//!
//! This module tracks performance metrics for the data-memory model. It provides:
//! 1. **Traffic:** Cycles, loads and stores issued, and how each was satisfied.
//! 2. **Cache:** Hits, primary misses, coalesced (secondary) misses, and forwarded loads.
//! 3. **Refill:** Writebacks, fetches, beats moved, and backend refusals.
//! 4. **Stalls:** Structural stall counts broken down by cause.

use std::time::Instant;

use crate::common::Stall;

/// Statistics structure tracking all memory subsystem metrics.
#[derive(Clone, Debug)]
pub struct MemStats {
    start_time: Instant,
    /// Total cycles elapsed.
    pub cycles: u64,
    /// Loads accepted into the load queue.
    pub loads: u64,
    /// Stores accepted into the store queue.
    pub stores: u64,
    /// Loads squashed by a pipeline flush.
    pub loads_squashed: u64,

    /// Cache requests answered in the same cycle.
    pub hits: u64,
    /// Cache requests that allocated a new MSHR.
    pub misses: u64,
    /// Cache requests merged into an existing MSHR.
    pub coalesced: u64,
    /// Loads satisfied from the store queue without a cache access.
    pub forwarded: u64,

    /// Dirty lines written back.
    pub writebacks: u64,
    /// Lines fetched from memory.
    pub fetches: u64,
    /// Backend beats written.
    pub write_beats: u64,
    /// Backend beats read.
    pub read_beats: u64,
    /// Requests the backend refused (`ready = 0`).
    pub backend_refusals: u64,

    /// Stalls: MSHR file full.
    pub stall_mshr_full: u64,
    /// Stalls: load queue full.
    pub stall_load_queue_full: u64,
    /// Stalls: store queue full.
    pub stall_store_queue_full: u64,
    /// Stalls: line under eviction.
    pub stall_eviction: u64,
    /// Stalls: every way of the set pending.
    pub stall_set_busy: u64,
    /// Stalls: cache port already used this cycle.
    pub stall_port_busy: u64,
    /// Stalls: partial store-to-load overlap.
    pub stall_forward_conflict: u64,
}

impl Default for MemStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            loads: 0,
            stores: 0,
            loads_squashed: 0,
            hits: 0,
            misses: 0,
            coalesced: 0,
            forwarded: 0,
            writebacks: 0,
            fetches: 0,
            write_beats: 0,
            read_beats: 0,
            backend_refusals: 0,
            stall_mshr_full: 0,
            stall_load_queue_full: 0,
            stall_store_queue_full: 0,
            stall_eviction: 0,
            stall_set_busy: 0,
            stall_port_busy: 0,
            stall_forward_conflict: 0,
        }
    }
}

/// Counts reported by the cache controller since they were last collected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheCounters {
    /// Requests answered in the same cycle.
    pub hits: u64,
    /// Requests that allocated a new MSHR.
    pub misses: u64,
    /// Requests merged into an existing MSHR.
    pub coalesced: u64,
    /// Dirty lines written back.
    pub writebacks: u64,
    /// Lines fetched.
    pub fetches: u64,
    /// Beats written.
    pub write_beats: u64,
    /// Beats read.
    pub read_beats: u64,
    /// Requests refused by the backend.
    pub backend_refusals: u64,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"cache"`, `"refill"`, `"stalls"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "cache", "refill", "stalls"];

impl MemStats {
    /// Counts one occurrence of `stall`.
    pub const fn record_stall(&mut self, stall: Stall) {
        let counter = match stall {
            Stall::MshrFull => &mut self.stall_mshr_full,
            Stall::LoadQueueFull => &mut self.stall_load_queue_full,
            Stall::StoreQueueFull => &mut self.stall_store_queue_full,
            Stall::EvictionInFlight(_) => &mut self.stall_eviction,
            Stall::SetBusy(_) => &mut self.stall_set_busy,
            Stall::PortBusy => &mut self.stall_port_busy,
            Stall::ForwardConflict(_) => &mut self.stall_forward_conflict,
        };
        *counter += 1;
    }

    /// Adds counts collected from the cache controller.
    pub const fn absorb(&mut self, counters: CacheCounters) {
        self.hits += counters.hits;
        self.misses += counters.misses;
        self.coalesced += counters.coalesced;
        self.writebacks += counters.writebacks;
        self.fetches += counters.fetches;
        self.write_beats += counters.write_beats;
        self.read_beats += counters.read_beats;
        self.backend_refusals += counters.backend_refusals;
    }

    /// Total stalls of every kind.
    pub const fn total_stalls(&self) -> u64 {
        self.stall_mshr_full
            + self.stall_load_queue_full
            + self.stall_store_queue_full
            + self.stall_eviction
            + self.stall_set_busy
            + self.stall_port_busy
            + self.stall_forward_conflict
    }

    /// Fraction of cache requests that hit, in percent.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.coalesced;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of `"summary"`, `"cache"`,
    /// `"refill"`, or `"stalls"`. Pass an empty slice to print all sections.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1);

        if want("summary") {
            let khz = (self.cycles as f64 / seconds) / 1000.0;
            println!("\n==========================================================");
            println!("L1 DATA MEMORY SUBSYSTEM STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_cycles               {}", self.cycles);
            println!("sim_freq                 {khz:.2} kHz");
            println!("ops.load                 {}", self.loads);
            println!("ops.store                {}", self.stores);
            println!("ops.load_squashed        {}", self.loads_squashed);
            println!("----------------------------------------------------------");
        }
        if want("cache") {
            println!("CACHE");
            println!("  cache.hits             {}", self.hits);
            println!("  cache.misses           {}", self.misses);
            println!("  cache.coalesced        {}", self.coalesced);
            println!("  cache.hit_rate         {:.2}%", self.hit_rate());
            println!("  lsu.forwarded          {}", self.forwarded);
            println!("----------------------------------------------------------");
        }
        if want("refill") {
            println!("REFILL");
            println!("  mem.fetches            {}", self.fetches);
            println!("  mem.writebacks         {}", self.writebacks);
            println!("  mem.read_beats         {}", self.read_beats);
            println!("  mem.write_beats        {}", self.write_beats);
            println!(
                "  mem.refusals           {} ({:.2}% of cycles)",
                self.backend_refusals,
                (self.backend_refusals as f64 / cyc as f64) * 100.0
            );
            println!("----------------------------------------------------------");
        }
        if want("stalls") {
            println!("STALLS");
            println!("  stall.mshr_full        {}", self.stall_mshr_full);
            println!("  stall.lq_full          {}", self.stall_load_queue_full);
            println!("  stall.sq_full          {}", self.stall_store_queue_full);
            println!("  stall.eviction         {}", self.stall_eviction);
            println!("  stall.set_busy         {}", self.stall_set_busy);
            println!("  stall.port_busy        {}", self.stall_port_busy);
            println!("  stall.forward_conflict {}", self.stall_forward_conflict);
            println!("  stall.total            {}", self.total_stalls());
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}

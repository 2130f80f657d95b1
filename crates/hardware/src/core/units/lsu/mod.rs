//! Load/Store Unit (LSU).
//!
//! This module connects the pipeline to the data cache. It includes:
//! - [`load_queue`]: In-order tracking of loads whose data may arrive out of order.
//! - [`store_queue`]: Program-ordered pending stores with store-to-load forwarding.
//!
//! [`LoadStoreUnit`] owns both queues, the cache controller, and the backend
//! port, and advances them together one cycle per `tick`. The cache has a single
//! request port: at most one load or store drain is presented per cycle.

/// Load queue with tagged out-of-order fill and in-order dequeue.
pub mod load_queue;

/// Store queue with forwarding.
pub mod store_queue;

use tracing::{debug, trace};

use self::load_queue::{LoadId, LoadQueue, LoadResult};
use self::store_queue::{ForwardResult, StoreQueue};
use crate::common::data::MemWidth;
use crate::common::{CacheGeometry, Stall};
use crate::core::units::cache::controller::{Accepted, CacheController, CacheRequest};
use crate::soc::memory::backend::MemoryBackend;
use crate::stats::MemStats;

/// Load/Store Unit: queues, cache, and backend port advanced in lockstep.
#[derive(Debug)]
pub struct LoadStoreUnit<B: MemoryBackend> {
    controller: CacheController,
    backend: B,
    load_queue: LoadQueue,
    store_queue: StoreQueue,
    port_used: bool,
    stats: MemStats,
}

impl<B: MemoryBackend> LoadStoreUnit<B> {
    /// Creates a unit from its parts.
    ///
    /// # Arguments
    ///
    /// * `geometry` - Data cache geometry.
    /// * `mshr_entries` - Number of MSHRs.
    /// * `beat_words` - Words per backend beat.
    /// * `lq_depth` / `sq_depth` - Queue capacities.
    /// * `backend` - Memory port.
    pub fn new(
        geometry: CacheGeometry,
        mshr_entries: usize,
        beat_words: usize,
        lq_depth: usize,
        sq_depth: usize,
        backend: B,
    ) -> Self {
        Self {
            controller: CacheController::new(geometry, mshr_entries, beat_words),
            backend,
            load_queue: LoadQueue::new(lq_depth),
            store_queue: StoreQueue::new(sq_depth),
            port_used: false,
            stats: MemStats::default(),
        }
    }

    /// The cache controller.
    pub const fn controller(&self) -> &CacheController {
        &self.controller
    }

    /// The memory port.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable memory port, for preloading memory or driving back-pressure.
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The load queue.
    pub const fn load_queue(&self) -> &LoadQueue {
        &self.load_queue
    }

    /// The store queue.
    pub const fn store_queue(&self) -> &StoreQueue {
        &self.store_queue
    }

    /// Counters collected so far.
    pub const fn stats(&self) -> &MemStats {
        &self.stats
    }

    fn stall<T>(&mut self, stall: Stall) -> Result<T, Stall> {
        trace!(%stall, "lsu stall");
        self.stats.record_stall(stall);
        Err(stall)
    }

    /// Presents `request` on the cache port and collects the controller's counts.
    fn access(&mut self, request: &CacheRequest) -> Result<Accepted, Stall> {
        let result = self.controller.request(request);
        self.stats.absorb(self.controller.take_counters());
        if let Err(stall) = result {
            self.stats.record_stall(stall);
        }
        result
    }

    /// Issues a load in program order.
    ///
    /// Pending stores are checked first; a fully covering store answers the
    /// load without using the cache port.
    ///
    /// # Errors
    ///
    /// Returns the [`Stall`] that kept the load from issuing; nothing is
    /// enqueued and the load may be retried next cycle.
    pub fn issue_load(&mut self, addr: u32, rd: u8, width: MemWidth, signed: bool) -> Result<LoadId, Stall> {
        if self.load_queue.is_full() {
            return self.stall(Stall::LoadQueueFull);
        }
        match self.store_queue.forward(addr, width, signed) {
            ForwardResult::Hit(value) => {
                let id = self.load_queue.enqueue(addr, rd, width, signed)?;
                self.load_queue.fill_value(id, value);
                self.stats.loads += 1;
                self.stats.forwarded += 1;
                trace!(addr, tag = id.0, value, "load forwarded");
                return Ok(id);
            }
            ForwardResult::Stall => return self.stall(Stall::ForwardConflict(addr)),
            ForwardResult::Miss => {}
        }
        if self.port_used {
            return self.stall(Stall::PortBusy);
        }

        let tag = self.load_queue.next_id();
        let accepted = self.access(&CacheRequest::read(addr, tag))?;
        self.port_used = true;
        let id = self.load_queue.enqueue(addr, rd, width, signed)?;
        if let Accepted::Hit(word) = accepted {
            self.load_queue.fill(id, word);
        }
        self.stats.loads += 1;
        Ok(id)
    }

    /// Issues an `SB`/`SH`/`SW` of the low bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Stall::StoreQueueFull`] when the store queue has no free slot.
    pub fn issue_store(&mut self, addr: u32, value: u32, width: MemWidth) -> Result<(), Stall> {
        match self.store_queue.enqueue_store(addr, value, width) {
            Ok(()) => {
                self.stats.stores += 1;
                Ok(())
            }
            Err(stall) => self.stall(stall),
        }
    }

    /// Issues a store of lane-positioned `data` with explicit byte enables.
    ///
    /// # Errors
    ///
    /// Returns [`Stall::StoreQueueFull`] when the store queue has no free slot.
    pub fn issue_store_lanes(&mut self, addr: u32, data: u32, byte_enable: u8) -> Result<(), Stall> {
        match self.store_queue.enqueue(addr, data, byte_enable) {
            Ok(()) => {
                self.stats.stores += 1;
                Ok(())
            }
            Err(stall) => self.stall(stall),
        }
    }

    /// Removes the oldest load if its value is available.
    pub fn dequeue(&mut self) -> Option<LoadResult> {
        self.load_queue.dequeue()
    }

    /// Advances every component by one cycle.
    ///
    /// Drains the oldest store into the cache if the port was not used by a
    /// load, steps the refill engine, and delivers completed loads.
    pub fn tick(&mut self) {
        if !self.port_used
            && let Some(store) = self.store_queue.head().copied()
        {
            let request = CacheRequest::write(store.addr, store.data, store.byte_enable);
            if self.access(&request).is_ok() {
                let _ = self.store_queue.retire_head();
                trace!(addr = store.addr, "store drained");
            }
        }

        for completion in self.controller.tick(&mut self.backend) {
            self.load_queue.fill(completion.tag, completion.word);
        }
        self.stats.absorb(self.controller.take_counters());
        self.backend.tick();
        self.load_queue.reclaim_squashed();
        self.port_used = false;
        self.stats.cycles += 1;
    }

    /// Pipeline flush: squashes every queued load.
    ///
    /// Stores are already committed and are kept. Outstanding misses complete
    /// normally; squashed loads are discarded when their data arrives.
    pub fn flush(&mut self) {
        let squashed = self.load_queue.live_len() as u64;
        self.load_queue.flush();
        self.stats.loads_squashed += squashed;
        debug!(squashed, "lsu flush");
    }

    /// Invalidates every resident cache line.
    pub fn fence(&mut self) {
        self.controller.invalidate_all();
    }

    /// Returns `true` when no load, store, or miss is outstanding.
    pub fn is_quiescent(&self) -> bool {
        self.load_queue.is_empty() && self.store_queue.is_empty() && self.controller.is_idle()
    }

    /// Empties both queues and returns the cache to its power-on state.
    ///
    /// Read data still in flight in the backend is discarded with the misses
    /// that requested it. Counters are kept.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.backend.reset();
        self.load_queue.reset();
        self.store_queue.reset();
        self.port_used = false;
    }
}

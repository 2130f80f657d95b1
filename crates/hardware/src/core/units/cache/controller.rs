//! Cache Controller.
//!
//! The controller owns cache storage, the MSHR file, and the port arbiter, and is
//! the only component that mutates storage. It has two halves:
//! 1. **Request Path:** Evaluated combinationally when the pipeline presents a request.
//!    Hits are answered in the same cycle; misses allocate or coalesce into an MSHR.
//! 2. **Refill Engine:** A state machine advanced once per `tick`. It walks the
//!    granted MSHR through victim writeback, line fetch, and cache update.
//!
//! The refill state machine is a pure function (`transition`) of the current
//! state and the cycle's handshake inputs; the controller applies the side
//! effects (victim snapshot, beat transfer, line install) around it.

use tracing::{debug, trace};

use super::arbiter::PortArbiter;
use super::mshr::{MshrFile, MshrId, MshrState, MshrTarget};
use super::{CacheStorage, Lookup};
use crate::common::data::merge_bytes;
use crate::common::{CacheGeometry, Stall, WORD_BYTES};
use crate::core::units::lsu::load_queue::LoadId;
use crate::soc::memory::backend::{MemRequest, MemoryBackend};
use crate::stats::CacheCounters;

/// A request presented by the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheRequest {
    /// Byte address.
    pub addr: u32,
    /// `true` for a store.
    pub is_write: bool,
    /// Lane-positioned store data.
    pub write_data: u32,
    /// Bytes to write; ignored for reads.
    pub byte_enable: u8,
    /// Load queue tag returned with the read data.
    pub tag: LoadId,
}

impl CacheRequest {
    /// A read of the word containing `addr`, answered with `tag`.
    pub const fn read(addr: u32, tag: LoadId) -> Self {
        Self {
            addr,
            is_write: false,
            write_data: 0,
            byte_enable: 0,
            tag,
        }
    }

    /// A byte-enabled write of lane-positioned `data`.
    pub const fn write(addr: u32, data: u32, byte_enable: u8) -> Self {
        Self {
            addr,
            is_write: true,
            write_data: data,
            byte_enable,
            tag: LoadId(0),
        }
    }
}

/// How an accepted request will be answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accepted {
    /// Answered this cycle; carries the current word (after the write, for stores).
    Hit(u32),
    /// Parked in the given MSHR until its line arrives.
    Miss(MshrId),
}

/// Pipeline-facing handshake signals for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheResponse {
    /// The request was accepted.
    pub ready: bool,
    /// Response data is valid this cycle.
    pub resp_valid: bool,
    /// Response data.
    pub resp_data: u32,
}

impl CacheResponse {
    /// Derives the handshake signals from a request result.
    pub const fn from_result(result: &Result<Accepted, Stall>) -> Self {
        match result {
            Ok(Accepted::Hit(word)) => Self {
                ready: true,
                resp_valid: true,
                resp_data: *word,
            },
            Ok(Accepted::Miss(_)) => Self {
                ready: true,
                resp_valid: false,
                resp_data: 0,
            },
            Err(_) => Self {
                ready: false,
                resp_valid: false,
                resp_data: 0,
            },
        }
    }
}

/// Read data for a load that missed, delivered when its line is installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Load queue tag from the original request.
    pub tag: LoadId,
    /// The full word containing the load address.
    pub word: u32,
}

/// State of the refill engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefillState {
    /// No MSHR holds the memory port.
    #[default]
    Idle,
    /// Writing back the dirty victim, `beat` beats sent so far.
    Writeback {
        /// MSHR being serviced.
        mshr: MshrId,
        /// Beats accepted by the backend.
        beat: usize,
    },
    /// Fetching the missed line.
    Fetch {
        /// MSHR being serviced.
        mshr: MshrId,
        /// The read request has been accepted.
        issued: bool,
        /// Beats received.
        received: usize,
    },
    /// Applying targets and installing the line.
    UpdateCache {
        /// MSHR being serviced.
        mshr: MshrId,
    },
}

/// Handshake inputs observed by the refill engine in one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefillInputs {
    /// MSHR granted the port this cycle.
    pub grant: Option<MshrId>,
    /// The granted MSHR's victim is valid and dirty.
    pub victim_dirty: bool,
    /// The backend accepted the request presented this cycle.
    pub accepted: bool,
    /// A read beat arrived this cycle.
    pub beat_received: bool,
    /// Beats per line transfer.
    pub beats_per_line: usize,
}

/// Next state of the refill engine.
pub const fn transition(state: RefillState, inputs: RefillInputs) -> RefillState {
    let beats = if inputs.beats_per_line == 0 {
        1
    } else {
        inputs.beats_per_line
    };
    match state {
        RefillState::Idle => match inputs.grant {
            Some(mshr) if inputs.victim_dirty => RefillState::Writeback { mshr, beat: 0 },
            Some(mshr) => RefillState::Fetch {
                mshr,
                issued: false,
                received: 0,
            },
            None => RefillState::Idle,
        },
        RefillState::Writeback { mshr, beat } => {
            if !inputs.accepted {
                state
            } else if beat + 1 >= beats {
                RefillState::Fetch {
                    mshr,
                    issued: false,
                    received: 0,
                }
            } else {
                RefillState::Writeback {
                    mshr,
                    beat: beat + 1,
                }
            }
        }
        RefillState::Fetch {
            mshr,
            issued: false,
            received,
        } => {
            if inputs.accepted {
                RefillState::Fetch {
                    mshr,
                    issued: true,
                    received,
                }
            } else {
                state
            }
        }
        RefillState::Fetch {
            mshr,
            issued: true,
            received,
        } => {
            if !inputs.beat_received {
                state
            } else if received + 1 >= beats {
                RefillState::UpdateCache { mshr }
            } else {
                RefillState::Fetch {
                    mshr,
                    issued: true,
                    received: received + 1,
                }
            }
        }
        RefillState::UpdateCache { .. } => RefillState::Idle,
    }
}

/// Snapshot of the victim taken at grant time.
#[derive(Debug, Default)]
struct RefillBuffers {
    line_addr: u32,
    set: usize,
    way: usize,
    writeback_addr: u32,
    writeback: Vec<u32>,
    fill: Vec<u32>,
}

/// The data cache controller.
#[derive(Debug)]
pub struct CacheController {
    storage: CacheStorage,
    mshrs: MshrFile,
    arbiter: PortArbiter,
    refill: RefillState,
    buffers: RefillBuffers,
    beat_words: usize,
    counters: CacheCounters,
}

impl CacheController {
    /// Creates a controller with empty storage and `mshr_entries` MSHRs.
    ///
    /// `beat_words` is clamped to the line size; equal values give single-beat transfers.
    pub fn new(geometry: CacheGeometry, mshr_entries: usize, beat_words: usize) -> Self {
        let line_words = geometry.line_words();
        Self {
            storage: CacheStorage::new(geometry),
            mshrs: MshrFile::new(mshr_entries, geometry),
            arbiter: PortArbiter::new(),
            refill: RefillState::Idle,
            buffers: RefillBuffers {
                fill: vec![0; line_words],
                ..RefillBuffers::default()
            },
            beat_words: beat_words.clamp(1, line_words.max(1)),
            counters: CacheCounters::default(),
        }
    }

    /// Cache storage.
    pub const fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// The MSHR file.
    pub const fn mshrs(&self) -> &MshrFile {
        &self.mshrs
    }

    /// The port arbiter.
    pub const fn arbiter(&self) -> &PortArbiter {
        &self.arbiter
    }

    /// Current refill engine state.
    pub const fn refill_state(&self) -> RefillState {
        self.refill
    }

    /// Counts accumulated since the last [`CacheController::take_counters`].
    pub const fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Returns the accumulated counts and starts a new collection period.
    pub fn take_counters(&mut self) -> CacheCounters {
        std::mem::take(&mut self.counters)
    }

    /// Returns `true` when no miss is outstanding.
    pub fn is_idle(&self) -> bool {
        self.refill == RefillState::Idle && self.mshrs.is_empty()
    }

    fn beats_per_line(&self) -> usize {
        self.storage.geometry().line_words() / self.beat_words
    }

    /// Presents one request to the cache.
    ///
    /// # Errors
    ///
    /// Returns the [`Stall`] that kept the request from being accepted. Nothing
    /// is modified on a stall.
    pub fn request(&mut self, req: &CacheRequest) -> Result<Accepted, Stall> {
        let result = self.evaluate(req);
        match &result {
            Ok(Accepted::Hit(_)) => self.counters.hits += 1,
            Ok(Accepted::Miss(_)) => {}
            Err(stall) => debug!(addr = req.addr, write = req.is_write, %stall, "cache stall"),
        }
        result
    }

    fn evaluate(&mut self, req: &CacheRequest) -> Result<Accepted, Stall> {
        if req.is_write && req.byte_enable == 0 {
            return Ok(Accepted::Hit(0));
        }
        let geometry = *self.storage.geometry();
        let set = geometry.set_index(req.addr);
        let word = geometry.word_offset(req.addr);

        if let Lookup::Hit(way) = self.storage.lookup(req.addr) {
            if req.is_write {
                self.storage
                    .write_bytes(set, way, word, req.write_data, req.byte_enable);
            }
            self.storage.touch(set, way);
            return Ok(Accepted::Hit(self.storage.read_word(set, way, word)));
        }

        if self.mshrs.evicting(req.addr).is_some() {
            return Err(Stall::EvictionInFlight(geometry.line_addr(req.addr)));
        }

        let target = if req.is_write {
            MshrTarget::Write {
                word,
                data: req.write_data,
                byte_enable: req.byte_enable,
            }
        } else {
            MshrTarget::Read { word, tag: req.tag }
        };

        if let Some(id) = self.mshrs.match_request(req.addr, word) {
            self.mshrs.push_target(id, target);
            self.counters.coalesced += 1;
            return Ok(Accepted::Miss(id));
        }

        let way = self
            .storage
            .select_victim(set, self.mshrs.pending_ways(set))
            .ok_or(Stall::SetBusy(set))?;
        let id = self.mshrs.allocate(req.addr, word)?;
        let evict_line = self
            .storage
            .is_valid(set, way)
            .then(|| geometry.line_addr_of(self.storage.tag(set, way), set));
        self.mshrs.assign_victim(id, way, evict_line);
        self.mshrs.push_target(id, target);
        self.counters.misses += 1;
        debug!(mshr = id.0, addr = req.addr, set, way, ?evict_line, "cache miss");
        Ok(Accepted::Miss(id))
    }

    /// Advances the refill engine by one cycle.
    ///
    /// Returns the load completions produced when a line is installed.
    pub fn tick<B: MemoryBackend + ?Sized>(&mut self, backend: &mut B) -> Vec<Completion> {
        let mut inputs = RefillInputs {
            beats_per_line: self.beats_per_line(),
            ..RefillInputs::default()
        };
        let mut completions = Vec::new();

        match self.refill {
            RefillState::Idle => {
                if let Some(id) = self.arbiter.arbitrate(&self.mshrs) {
                    inputs.grant = Some(id);
                    inputs.victim_dirty = self.snapshot_victim(id);
                }
            }
            RefillState::Writeback { mshr, beat } => {
                let start = beat * self.beat_words;
                let data = self
                    .buffers
                    .writeback
                    .get(start..start + self.beat_words)
                    .map(<[u32]>::to_vec)
                    .unwrap_or_default();
                let addr = self
                    .buffers
                    .writeback_addr
                    .wrapping_add((start * WORD_BYTES) as u32);
                inputs.accepted = self.present(backend, &MemRequest::Write { addr, data });
                if inputs.accepted {
                    self.counters.write_beats += 1;
                    trace!(mshr = mshr.0, addr, beat, "writeback beat");
                    if beat + 1 >= inputs.beats_per_line {
                        self.counters.writebacks += 1;
                        debug!(mshr = mshr.0, line = self.buffers.writeback_addr, "writeback done");
                        self.mshrs.set_state(mshr, MshrState::AwaitingFetch);
                    }
                }
            }
            RefillState::Fetch {
                mshr,
                issued: false,
                ..
            } => {
                let line_addr = self.buffers.line_addr;
                inputs.accepted = self.present(backend, &MemRequest::Read { line_addr });
                if inputs.accepted {
                    self.counters.fetches += 1;
                    debug!(mshr = mshr.0, line = line_addr, "fetch issued");
                }
            }
            RefillState::Fetch {
                mshr,
                issued: true,
                received,
            } => {
                if let Some(beat) = backend.poll_response() {
                    match self.beat_offset(beat.addr) {
                        Some(offset) => {
                            for (i, word) in beat.data.iter().enumerate() {
                                if let Some(slot) = self.buffers.fill.get_mut(offset + i) {
                                    *slot = *word;
                                }
                            }
                            self.counters.read_beats += 1;
                            inputs.beat_received = true;
                            trace!(mshr = mshr.0, addr = beat.addr, received, "fetch beat");
                            if received + 1 >= inputs.beats_per_line {
                                self.mshrs.set_state(mshr, MshrState::ReadyToRetire);
                            }
                        }
                        None => debug!(
                            mshr = mshr.0,
                            addr = beat.addr,
                            line = self.buffers.line_addr,
                            "beat outside the fetched line dropped"
                        ),
                    }
                }
            }
            RefillState::UpdateCache { mshr } => {
                completions = self.install(mshr);
            }
        }

        self.refill = transition(self.refill, inputs);
        completions
    }

    /// Word index of a read beat within the line being fetched, if it belongs to it.
    fn beat_offset(&self, addr: u32) -> Option<usize> {
        let line_bytes = self.storage.geometry().line_words() * WORD_BYTES;
        let offset = addr.checked_sub(self.buffers.line_addr)? as usize;
        (offset < line_bytes).then_some(offset / WORD_BYTES)
    }

    fn present<B: MemoryBackend + ?Sized>(&mut self, backend: &mut B, request: &MemRequest) -> bool {
        let accepted = backend.try_request(request);
        if !accepted {
            self.counters.backend_refusals += 1;
        }
        accepted
    }

    /// Captures the victim of `id` and frees its way. Returns whether it must be written back.
    fn snapshot_victim(&mut self, id: MshrId) -> bool {
        let Some(entry) = self.mshrs.get(id) else {
            return false;
        };
        let geometry = *self.storage.geometry();
        let line_addr = entry.line_addr;
        let set = geometry.set_index(line_addr);
        let way = entry.victim_way.unwrap_or(0);
        let dirty = self.storage.is_dirty(set, way);
        let evict_line = self
            .storage
            .is_valid(set, way)
            .then(|| geometry.line_addr_of(self.storage.tag(set, way), set));

        self.buffers.line_addr = line_addr;
        self.buffers.set = set;
        self.buffers.way = way;
        self.buffers.fill.fill(0);
        if dirty {
            self.buffers.writeback_addr = evict_line.unwrap_or(0);
            self.buffers.writeback = self.storage.line_data(set, way).to_vec();
        } else {
            self.buffers.writeback.clear();
        }

        self.storage.invalidate(set, way);
        self.mshrs.assign_victim(id, way, evict_line);
        self.mshrs.set_state(
            id,
            if dirty {
                MshrState::AwaitingWriteback
            } else {
                MshrState::AwaitingFetch
            },
        );
        debug!(mshr = id.0, line = line_addr, set, way, dirty, ?evict_line, "refill start");
        dirty
    }

    /// Applies targets in arrival order, installs the line, and retires the MSHR.
    fn install(&mut self, id: MshrId) -> Vec<Completion> {
        let Some(entry) = self.mshrs.get(id) else {
            self.arbiter.release(id);
            return Vec::new();
        };
        let mut completions = Vec::new();
        let mut written = false;
        for target in &entry.targets {
            match *target {
                MshrTarget::Read { word, tag } => {
                    let value = self.buffers.fill.get(word).copied().unwrap_or(0);
                    completions.push(Completion { tag, word: value });
                }
                MshrTarget::Write {
                    word,
                    data,
                    byte_enable,
                } => {
                    if let Some(slot) = self.buffers.fill.get_mut(word) {
                        *slot = merge_bytes(*slot, data, byte_enable);
                        written |= byte_enable != 0;
                    }
                }
            }
        }

        let geometry = *self.storage.geometry();
        let (set, way) = (self.buffers.set, self.buffers.way);
        let tag = geometry.tag(self.buffers.line_addr);
        self.storage.update(set, way, tag, &self.buffers.fill, written);
        self.storage.touch(set, way);
        debug!(
            mshr = id.0,
            line = self.buffers.line_addr,
            set,
            way,
            dirty = written,
            loads = completions.len(),
            "line installed"
        );
        self.mshrs.retire(id);
        self.arbiter.release(id);
        completions
    }

    /// Invalidates every resident line; outstanding refills still complete.
    pub fn invalidate_all(&mut self) {
        debug!("invalidate all");
        self.storage.invalidate_all();
    }

    /// Returns the controller to its power-on state, dropping every miss.
    pub fn reset(&mut self) {
        let geometry = *self.storage.geometry();
        self.storage = CacheStorage::new(geometry);
        self.mshrs.reset();
        self.arbiter.reset();
        self.refill = RefillState::Idle;
        self.buffers.fill.fill(0);
        self.buffers.writeback.clear();
    }
}

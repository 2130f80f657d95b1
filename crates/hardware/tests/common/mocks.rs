use mockall::mock;
use rvmem_core::soc::memory::backend::{MemBeat, MemRequest, MemoryBackend};

mock! {
    pub Backend {}
    impl MemoryBackend for Backend {
        fn try_request(&mut self, request: &MemRequest) -> bool;
        fn poll_response(&mut self) -> Option<MemBeat>;
        fn tick(&mut self);
        fn reset(&mut self);
    }
}

/// Wraps a backend and logs every request it accepts, in acceptance order.
#[derive(Debug)]
pub struct RecordingBackend<B> {
    pub inner: B,
    pub accepted: Vec<MemRequest>,
    pub refused: u64,
}

impl<B: MemoryBackend> RecordingBackend<B> {
    pub const fn new(inner: B) -> Self {
        Self {
            inner,
            accepted: Vec::new(),
            refused: 0,
        }
    }

    /// Line addresses of accepted reads.
    pub fn reads(&self) -> Vec<u32> {
        self.accepted
            .iter()
            .filter_map(|r| match r {
                MemRequest::Read { line_addr } => Some(*line_addr),
                MemRequest::Write { .. } => None,
            })
            .collect()
    }

    /// Addresses of accepted write beats.
    pub fn writes(&self) -> Vec<u32> {
        self.accepted
            .iter()
            .filter_map(|r| match r {
                MemRequest::Write { addr, .. } => Some(*addr),
                MemRequest::Read { .. } => None,
            })
            .collect()
    }
}

impl<B: MemoryBackend> MemoryBackend for RecordingBackend<B> {
    fn try_request(&mut self, request: &MemRequest) -> bool {
        let accepted = self.inner.try_request(request);
        if accepted {
            self.accepted.push(request.clone());
        } else {
            self.refused += 1;
        }
        accepted
    }

    fn poll_response(&mut self) -> Option<MemBeat> {
        self.inner.poll_response()
    }

    fn tick(&mut self) {
        self.inner.tick();
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

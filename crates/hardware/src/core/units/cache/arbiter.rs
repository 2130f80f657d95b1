//! Memory Port Arbiter.
//!
//! The backend has a single port, so only one line transaction (writeback,
//! fetch, and install) may be in progress at a time. The arbiter grants the
//! port to the oldest MSHR still waiting for it and holds the grant until the
//! refill engine releases it.

use tracing::debug;

use super::mshr::{MshrFile, MshrId, MshrState};

/// Grant state of the single backend port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortArbiter {
    grant: Option<MshrId>,
}

impl PortArbiter {
    /// Creates an idle arbiter.
    pub const fn new() -> Self {
        Self { grant: None }
    }

    /// The MSHR currently holding the port.
    pub const fn grant(&self) -> Option<MshrId> {
        self.grant
    }

    /// Returns `true` when no MSHR holds the port.
    pub const fn is_idle(&self) -> bool {
        self.grant.is_none()
    }

    /// Grants the port to the oldest `Allocated` MSHR if it is free.
    ///
    /// Returns the new grant, or `None` when the port is busy or nothing waits.
    pub fn arbitrate(&mut self, mshrs: &MshrFile) -> Option<MshrId> {
        if self.grant.is_some() {
            return None;
        }
        let (id, entry) = mshrs
            .iter()
            .filter(|(_, e)| e.state == MshrState::Allocated)
            .min_by_key(|(_, e)| e.seq)?;
        debug!(mshr = id.0, line = entry.line_addr, seq = entry.seq, "port grant");
        self.grant = Some(id);
        Some(id)
    }

    /// Releases the port held by `id`; a release by any other id is ignored.
    pub fn release(&mut self, id: MshrId) {
        if self.grant == Some(id) {
            self.grant = None;
        }
    }

    /// Drops any grant.
    pub const fn reset(&mut self) {
        self.grant = None;
    }
}

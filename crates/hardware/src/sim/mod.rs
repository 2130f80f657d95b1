//! Simulation driver and trace replay.
//!
//! Provides the top-level `Simulator`, which builds the load/store unit, cache,
//! and backend from a `Config`, and the JSON access-trace format it replays.

/// Top-level simulator.
pub mod simulator;

/// JSON access traces.
pub mod trace;

pub use simulator::{ReplayReport, Simulator};
pub use trace::{Trace, TraceError, TraceOp};

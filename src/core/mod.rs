//! Runtime core: orchestration and process lifecycle.
//!
//! Internal modules:
//! - [`orchestrator`]: validates the run, drives the waves, tears down;
//! - [`schedule`]: pure ON/OFF phase planning;
//! - [`fleet`]: owns the worker processes (spawn, liveness, two-phase reaping);
//! - [`launcher`]: builds the command that starts a worker process;
//! - [`shutdown`]: cross-platform termination signal handling.

pub(crate) mod fleet;
pub(crate) mod launcher;
pub(crate) mod orchestrator;
pub(crate) mod schedule;
pub(crate) mod shutdown;

pub use fleet::{WorkerState, WorkerSummary};
pub use launcher::{Launcher, SelfExec};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport};
pub use schedule::{Phase, PhaseKind, Plan, WaveSchedule};

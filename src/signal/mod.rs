//! Cross-process control signals.
//!
//! Workers are separate OS processes, so the two control flags (BurnSignal and
//! StopSignal) cannot live in shared application memory. Each worker's stdin is
//! a one-way control pipe; the orchestrator is its only writer.
//!
//! ## Contents
//! - [`ControlFrame`] one-byte wire vocabulary (`B` burn set, `b` burn clear, `S` stop)
//! - [`ControlPlane`], [`BurnSignal`], [`StopSignal`] orchestrator side (writers)
//! - [`ControlListener`], [`SignalFlag`] worker side (readers)
//!
//! ## Wiring
//! ```text
//! Orchestrator                                   Worker process
//!   BurnSignal.set() ─┐                            ┌─► listener thread
//!   StopSignal.set() ─┼─► ControlPlane ── pipe ────┤     ├─ B/b ─► SignalFlag (burn)
//!                     │    (one pipe per worker)   │     └─ S / EOF ─► CancellationToken (stop)
//!                     └────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Single writer per signal; readers only observe.
//! - There is no frame that clears stop: StopSignal is monotonic on both ends.
//! - EOF on the pipe means stop, so a worker never outlives its orchestrator.

mod control;
mod frame;
mod listener;

pub use control::{BurnSignal, ControlPlane, StopSignal};
pub use frame::ControlFrame;
pub use listener::{ControlListener, SignalFlag};

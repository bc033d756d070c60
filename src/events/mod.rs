//! Run events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! narrate a load-test run: wave transitions, worker lifecycle, shutdown.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Orchestrator` (run/wave/shutdown events), `Fleet`
//!   (worker spawn/exit/kill events).
//! - **Consumers**: the orchestrator's narration listener, which fans events
//!   out to a `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};

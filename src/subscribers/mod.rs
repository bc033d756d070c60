//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling run events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Orchestrator / Fleet ── publish(Event) ──► Bus ──► narration listener
//!                                                            │
//!                                                      SubscriberSet
//!                                                  ┌─────────┼─────────┐
//!                                                  ▼         ▼         ▼
//!                                              LogWriter  Timeline   Custom
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** observe and react (console narration: [`LogWriter`])
//! - **Stateful subscribers** record what they saw ([`Timeline`])

mod log;
mod set;
mod subscriber;
mod timeline;

pub use log::LogWriter;
pub use set::{NarrationStats, SubscriberSet};
pub use subscriber::Subscribe;
pub use timeline::{Timeline, TimelineEntry};

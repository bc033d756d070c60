//! # Narration subscribers.
//!
//! A [`Subscribe`] implementation receives every event of a run, in
//! publication order, from its own lane in the
//! [`SubscriberSet`](super::SubscriberSet). Built-ins: [`LogWriter`](super::LogWriter)
//! prints the console narration, [`Timeline`](super::Timeline) records it.
//!
//! ```rust
//! use async_trait::async_trait;
//! use loadwave::{Event, EventKind, Subscribe};
//!
//! /// Counts workers that ignored the StopSignal.
//! #[derive(Default)]
//! struct KillCounter(std::sync::atomic::AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for KillCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WorkerKilled {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "kill-counter"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Lane size when a subscriber does not ask for one.
///
/// A whole run publishes a few events per wave plus a handful per worker.
const DEFAULT_LANE_CAPACITY: usize = 256;

/// Receives run events.
///
/// `on_event` runs on the subscriber's lane task, never on the wave loop,
/// and must not block the executor. A panic is caught and narrated as
/// [`SubscriberPanicked`](crate::EventKind::SubscriberPanicked).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Short name shown in narration diagnostics.
    fn name(&self) -> &'static str;

    /// Events this subscriber may fall behind by before new ones are dropped
    /// for it (minimum 1).
    fn queue_capacity(&self) -> usize {
        DEFAULT_LANE_CAPACITY
    }
}

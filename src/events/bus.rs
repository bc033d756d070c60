//! # Event bus for broadcasting run events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from the orchestrator and its fleet.
//!
//! ## Architecture
//! ```text
//! Publishers:                          Subscriber (one):
//!   Orchestrator ──┐
//!                  ├──► Bus ───────► narration listener ────► SubscriberSet
//!   Fleet ─────────┘  (broadcast)     (per run)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active subscribers at send time.
//! - **Close on drop**: once every `Bus` clone is dropped, receivers see `Closed`.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for run events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers, the event is dropped (this function still returns immediately).
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    ///
    /// A receiver only gets events **sent after** it subscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_until_all_senders_drop() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::RunStarting));
        bus.clone().publish(Event::new(EventKind::RunFinished));
        drop(bus);

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::RunStarting);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::RunFinished);
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}

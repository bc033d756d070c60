//! # Run events emitted by the orchestrator and its fleet.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Run events**: start, deadline, interruption, finish
//! - **Wave events**: BurnSignal transitions (wave up / wave down)
//! - **Worker events**: spawn, early exit, voluntary exit, forced kill
//! - **Narration events**: a subscriber fell behind or panicked
//!
//! The [`Event`] struct carries additional metadata such as the worker
//! identity, the offset from the run start, and phase durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loadwave::{Event, EventKind, WorkerRole};
//!
//! let ev = Event::new(EventKind::WorkerSpawned)
//!     .with_worker(3, WorkerRole::Cpu)
//!     .with_pid(Some(4242));
//!
//! assert_eq!(ev.kind, EventKind::WorkerSpawned);
//! assert_eq!(ev.worker, Some(3));
//! assert_eq!(ev.pid, Some(4242));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::workers::WorkerRole;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of run events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Run events ===
    /// Run accepted; workers are about to be spawned.
    ///
    /// Sets:
    /// - `duration`: requested total duration
    /// - `count`: number of CPU workers
    RunStarting,

    /// Wave loop reached the requested total duration.
    ///
    /// Sets:
    /// - `offset`: elapsed time since the wave loop started
    DeadlineReached,

    /// Operator interruption (OS signal) observed.
    ///
    /// Sets:
    /// - `offset`: elapsed time since the wave loop started (if it had started)
    ShutdownRequested,

    /// StopSignal broadcast to the fleet.
    ///
    /// Sets:
    /// - `duration`: grace period granted to workers
    /// - `count`: number of control pipes reached
    StopBroadcast,

    /// Every worker exited on its own within the grace period.
    AllStoppedWithinGrace,

    /// Some workers were still alive when the grace period ended.
    ///
    /// Sets:
    /// - `count`: number of stuck workers
    /// - `reason`: their ids
    GraceExceeded,

    /// Run fully torn down; no worker process remains.
    RunFinished,

    // === Wave events ===
    /// BurnSignal set for the ON half of a wave.
    ///
    /// Sets:
    /// - `wave`: wave number (1-based)
    /// - `offset`: actual elapsed time at the transition
    /// - `duration`: planned phase length (possibly truncated by the deadline)
    /// - `count`: number of control pipes reached
    WaveUp,

    /// BurnSignal cleared for the OFF half of a wave.
    ///
    /// Same fields as [`EventKind::WaveUp`].
    WaveDown,

    // === Worker events ===
    /// Worker process started and its control pipe attached.
    ///
    /// Sets:
    /// - `worker`, `role`, `pid`
    WorkerSpawned,

    /// Worker process could not be started (aborts the run).
    ///
    /// Sets:
    /// - `role`
    /// - `reason`: OS error
    WorkerSpawnFailed,

    /// Worker exited before StopSignal was set.
    ///
    /// Sets:
    /// - `worker`, `role`, `pid`
    /// - `reason`: exit status
    WorkerLost,

    /// Worker exited after StopSignal, within the grace period.
    ///
    /// Sets:
    /// - `worker`, `role`, `pid`
    /// - `reason`: exit status
    WorkerExited,

    /// Worker outlived the grace period and was killed, then reaped.
    ///
    /// Sets:
    /// - `worker`, `role`, `pid`
    /// - `reason`: exit status after the kill
    WorkerKilled,

    // === Narration events ===
    /// An event could not be queued for one subscriber and was dropped for it.
    ///
    /// Sets:
    /// - `subscriber`: the subscriber that missed the event
    /// - `reason`: `full` or `closed`
    SubscriberOverflow,

    /// A subscriber panicked while handling an event.
    ///
    /// Sets:
    /// - `subscriber`
    /// - `reason`: panic payload
    SubscriberPanicked,
}

impl EventKind {
    /// True for events produced by the narration fan-out itself.
    #[inline]
    pub fn is_narration(self) -> bool {
        matches!(self, EventKind::SubscriberOverflow | EventKind::SubscriberPanicked)
    }
}

/// Run event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Fleet-local worker id.
    pub worker: Option<u32>,
    /// Worker role.
    pub role: Option<WorkerRole>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Wave number (1-based).
    pub wave: Option<u32>,
    /// Elapsed time since the wave loop started.
    pub offset: Option<Duration>,
    /// Phase length, grace period or total duration, depending on the kind.
    pub duration: Option<Duration>,
    /// A count: workers reached, stuck workers, CPU workers.
    pub count: Option<u32>,
    /// Human-readable reason (exit status, error text).
    pub reason: Option<Arc<str>>,
    /// Subscriber name, for narration events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            role: None,
            pid: None,
            wave: None,
            offset: None,
            duration: None,
            count: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches the worker identity.
    #[inline]
    pub fn with_worker(mut self, id: u32, role: WorkerRole) -> Self {
        self.worker = Some(id);
        self.role = Some(role);
        self
    }

    /// Attaches a role without a worker id (spawn failures).
    #[inline]
    pub fn with_role(mut self, role: WorkerRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Attaches the OS process id, when known.
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Attaches a wave number.
    #[inline]
    pub fn with_wave(mut self, wave: u32) -> Self {
        self.wave = Some(wave);
        self
    }

    /// Attaches the elapsed time since the wave loop started.
    #[inline]
    pub fn with_offset(mut self, offset: Duration) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Attaches a duration.
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration = Some(d);
        self
    }

    /// Attaches a count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the subscriber name.
    #[inline]
    pub fn with_subscriber(mut self, name: &'static str) -> Self {
        self.subscriber = Some(name);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::WaveUp);
        let b = Event::new(EventKind::WaveDown);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn count_saturates() {
        let ev = Event::new(EventKind::StopBroadcast).with_count(usize::MAX);
        assert_eq!(ev.count, Some(u32::MAX));
    }
}

//! # Timeline: ordered record of a run.
//!
//! A stateful subscriber that keeps every event it receives, ordered by
//! sequence number. Useful for asserting wave boundaries and shutdown
//! behaviour after a run, or for post-run reporting.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::workers::WorkerRole;

/// One recorded event.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    /// Event sequence number.
    pub seq: u64,
    /// Event classification.
    pub kind: EventKind,
    /// Wave number, for wave events.
    pub wave: Option<u32>,
    /// Elapsed time since the wave loop started.
    pub offset: Option<Duration>,
    /// Phase length / grace / total, depending on the kind.
    pub duration: Option<Duration>,
    /// Worker id, for worker events.
    pub worker: Option<u32>,
    /// Worker role, for worker events.
    pub role: Option<WorkerRole>,
}

/// Recording subscriber.
#[derive(Default)]
pub struct Timeline {
    entries: Mutex<Vec<TimelineEntry>>,
}

impl Timeline {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, ordered by sequence number.
    pub async fn entries(&self) -> Vec<TimelineEntry> {
        let mut entries = self.entries.lock().await.clone();
        entries.sort_unstable_by_key(|e| e.seq);
        entries
    }

    /// Number of entries of one kind.
    pub async fn count(&self, kind: EventKind) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Wave transitions (up and down) in order, as `(kind, offset)` pairs.
    pub async fn wave_boundaries(&self) -> Vec<(EventKind, Duration)> {
        self.entries()
            .await
            .into_iter()
            .filter(|e| matches!(e.kind, EventKind::WaveUp | EventKind::WaveDown))
            .filter_map(|e| e.offset.map(|t| (e.kind, t)))
            .collect()
    }
}

#[async_trait]
impl Subscribe for Timeline {
    async fn on_event(&self, e: &Event) {
        self.entries.lock().await.push(TimelineEntry {
            seq: e.seq,
            kind: e.kind,
            wave: e.wave,
            offset: e.offset,
            duration: e.duration,
            worker: e.worker,
            role: e.role,
        });
    }

    fn name(&self) -> &'static str {
        "timeline"
    }
}

//! # Narration fan-out.
//!
//! The orchestrator's narration listener hands every bus event to a
//! [`SubscriberSet`]. Each subscriber owns a lane: a bounded queue drained by
//! its own task, so a slow console never holds back the timeline (or the
//! wave loop, which only ever publishes).
//!
//! ```text
//!  emit(ev) ─┬─ pending reports first ─┐
//!            ▼                         │
//!        lane "LogWriter" ─► task ─► on_event ──panic──┐
//!        lane "timeline"  ─► task ─► on_event          │
//!            │                                         │
//!            └─ full / closed ─► SubscriberOverflow ───┴─► reports queue
//! ```
//!
//! Problems with narration are narrated too: an event dropped for one lane
//! becomes a [`SubscriberOverflow`](EventKind::SubscriberOverflow) and a
//! caught panic becomes a [`SubscriberPanicked`](EventKind::SubscriberPanicked).
//! Both are queued and delivered to every lane ahead of the next event.
//! A narration event that itself overflows or panics is only logged, so a
//! broken subscriber cannot feed itself.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Pending narration reports kept between two emits.
const REPORT_BACKLOG: usize = 64;

struct Lane {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: u64,
}

/// Delivery totals returned by [`SubscriberSet::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NarrationStats {
    /// Events handed to lanes.
    pub delivered: u64,
    /// Events dropped for some lane (counted once per lane).
    pub dropped: u64,
}

/// Per-subscriber lanes plus the queue of narration reports.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    tasks: Vec<JoinHandle<()>>,
    reports_tx: mpsc::Sender<Event>,
    reports: mpsc::Receiver<Event>,
    delivered: u64,
}

impl SubscriberSet {
    /// Opens one lane per subscriber. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let (reports_tx, reports) = mpsc::channel(REPORT_BACKLOG);
        let mut lanes = Vec::with_capacity(subs.len());
        let mut tasks = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
            lanes.push(Lane {
                name: sub.name(),
                tx,
                dropped: 0,
            });
            tasks.push(tokio::spawn(drain_lane(sub, rx, reports_tx.clone())));
        }

        Self {
            lanes,
            tasks,
            reports_tx,
            reports,
            delivered: 0,
        }
    }

    /// Queues `event` on every lane without waiting for any subscriber.
    ///
    /// Reports raised since the previous call go out first.
    pub fn emit(&mut self, event: &Event) {
        self.flush_reports();
        self.deliver(Arc::new(event.clone()));
    }

    fn flush_reports(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            self.deliver(Arc::new(report));
        }
    }

    fn deliver(&mut self, ev: Arc<Event>) {
        self.delivered += 1;
        for lane in &mut self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&ev)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            lane.dropped += 1;
            warn!(subscriber = lane.name, reason, kind = ?ev.kind, "narration event dropped");
            if !ev.kind.is_narration() {
                let report = Event::new(EventKind::SubscriberOverflow)
                    .with_subscriber(lane.name)
                    .with_reason(reason);
                let _ = self.reports_tx.try_send(report);
            }
        }
    }

    /// Delivers pending reports, closes every lane and waits for the lanes to drain.
    pub async fn shutdown(mut self) -> NarrationStats {
        self.flush_reports();
        let stats = NarrationStats {
            delivered: self.delivered,
            dropped: self.lanes.iter().map(|l| l.dropped).sum(),
        };
        drop(self.lanes);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "narration lane task failed");
            }
        }
        stats
    }

    /// True if no subscriber is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

/// Hands queued events to `sub` one at a time until the lane closes.
async fn drain_lane(
    sub: Arc<dyn Subscribe>,
    mut rx: mpsc::Receiver<Arc<Event>>,
    reports: mpsc::Sender<Event>,
) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        let Err(payload) = handled else { continue };

        let panic = panic_text(payload.as_ref());
        error!(subscriber = sub.name(), kind = ?ev.kind, %panic, "subscriber panicked");
        if !ev.kind.is_narration() {
            let report = Event::new(EventKind::SubscriberPanicked)
                .with_subscriber(sub.name())
                .with_reason(panic);
            let _ = reports.try_send(report);
        }
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::subscribers::Timeline;

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, ev: &Event) {
            if ev.kind == EventKind::WaveUp {
                panic!("cannot render wave");
            }
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    /// Blocks on its first event until released; one-slot queue.
    struct Stalled {
        release: Notify,
        first: AtomicBool,
    }

    #[async_trait]
    impl Subscribe for Stalled {
        async fn on_event(&self, _ev: &Event) {
            if self.first.swap(false, Ordering::SeqCst) {
                self.release.notified().await;
            }
        }

        fn name(&self) -> &'static str {
            "stalled"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn shutdown_drains_every_lane() {
        let timeline = Arc::new(Timeline::new());
        let mut set = SubscriberSet::new(vec![timeline.clone()]);
        for _ in 0..5 {
            set.emit(&Event::new(EventKind::WaveUp));
        }

        let stats = set.shutdown().await;
        assert_eq!(stats, NarrationStats { delivered: 5, dropped: 0 });
        assert_eq!(timeline.count(EventKind::WaveUp).await, 5);
    }

    #[tokio::test]
    async fn panic_is_narrated_to_the_other_lanes() {
        let timeline = Arc::new(Timeline::new());
        let mut set = SubscriberSet::new(vec![Arc::new(Panicker), timeline.clone()]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::WaveUp));
        // let the panicking lane run before the next emit picks up its report
        tokio::time::sleep(Duration::from_millis(50)).await;
        set.emit(&Event::new(EventKind::WaveDown));
        set.shutdown().await;

        let kinds: Vec<_> = timeline.entries().await.into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [EventKind::WaveUp, EventKind::SubscriberPanicked, EventKind::WaveDown]
        );
    }

    #[tokio::test]
    async fn overflow_is_narrated_once_per_drop() {
        let stalled = Arc::new(Stalled {
            release: Notify::new(),
            first: AtomicBool::new(true),
        });
        let timeline = Arc::new(Timeline::new());
        let mut set = SubscriberSet::new(vec![stalled.clone(), timeline.clone()]);

        // first event is taken by the stalled task, second fills its queue
        set.emit(&Event::new(EventKind::WaveUp));
        tokio::time::sleep(Duration::from_millis(20)).await;
        set.emit(&Event::new(EventKind::WaveDown));
        set.emit(&Event::new(EventKind::DeadlineReached));

        stalled.release.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = set.shutdown().await;

        assert_eq!(timeline.count(EventKind::SubscriberOverflow).await, 1);
        assert_eq!(timeline.count(EventKind::DeadlineReached).await, 1);
        assert_eq!(stats, NarrationStats { delivered: 4, dropped: 1 });
    }
}

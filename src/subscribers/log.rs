//! # LogWriter: console narration of a run
//!
//! Prints one human-readable line per [`Event`] to stdout so an operator can
//! follow wave transitions and worker lifecycle.
//!
//! ## Example output
//! ```text
//! [run-starting] duration=35s cpu_workers=8
//! [worker-spawned] worker=#1 role=cpu pid=41233
//! [wave-up] wave=1 t=0.0s burn=20s reached=10
//! [wave-down] wave=1 t=20.0s idle=10s reached=10
//! [wave-up] wave=2 t=30.0s burn=5s reached=10
//! [deadline-reached] t=35.0s
//! [stop-broadcast] grace=5s reached=10
//! [worker-exited] worker=#1 role=cpu pid=41233 status=exit status: 0
//! [worker-killed] worker=#10 role=log pid=41242 status=signal: 9 (SIGKILL)
//! [grace-exceeded] stuck=1 workers=#10
//! [run-finished]
//! ```
//!
//! A subscriber that cannot keep up shows as
//! `[subscriber-overflow] subscriber=timeline reason=full`.

use std::fmt::Write as _;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Formats one narration line.
    pub fn render(e: &Event) -> String {
        let mut line = String::new();
        match e.kind {
            EventKind::RunStarting => {
                line.push_str("[run-starting]");
                if let Some(d) = e.duration {
                    let _ = write!(line, " duration={}s", d.as_secs());
                }
                if let Some(n) = e.count {
                    let _ = write!(line, " cpu_workers={n}");
                }
            }
            EventKind::WaveUp | EventKind::WaveDown => {
                let (tag, label) = if e.kind == EventKind::WaveUp {
                    ("[wave-up]", "burn")
                } else {
                    ("[wave-down]", "idle")
                };
                line.push_str(tag);
                if let Some(w) = e.wave {
                    let _ = write!(line, " wave={w}");
                }
                if let Some(t) = e.offset {
                    let _ = write!(line, " t={:.1}s", t.as_secs_f64());
                }
                if let Some(d) = e.duration {
                    let _ = write!(line, " {label}={d:?}");
                }
                if let Some(n) = e.count {
                    let _ = write!(line, " reached={n}");
                }
            }
            EventKind::DeadlineReached => {
                line.push_str("[deadline-reached]");
                if let Some(t) = e.offset {
                    let _ = write!(line, " t={:.1}s", t.as_secs_f64());
                }
            }
            EventKind::ShutdownRequested => {
                line.push_str("[shutdown-requested] interrupted by operator");
            }
            EventKind::StopBroadcast => {
                line.push_str("[stop-broadcast]");
                if let Some(d) = e.duration {
                    let _ = write!(line, " grace={d:?}");
                }
                if let Some(n) = e.count {
                    let _ = write!(line, " reached={n}");
                }
            }
            EventKind::AllStoppedWithinGrace => line.push_str("[all-stopped-within-grace]"),
            EventKind::GraceExceeded => {
                let _ = write!(
                    line,
                    "[grace-exceeded] stuck={} workers={}",
                    e.count.unwrap_or(0),
                    e.reason.as_deref().unwrap_or("?")
                );
            }
            EventKind::RunFinished => line.push_str("[run-finished]"),
            EventKind::WorkerSpawned => {
                line.push_str("[worker-spawned]");
                push_worker(&mut line, e);
            }
            EventKind::WorkerSpawnFailed => {
                let _ = write!(
                    line,
                    "[worker-spawn-failed] role={} err={}",
                    e.role.map(|r| r.as_str()).unwrap_or("?"),
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::WorkerLost => {
                line.push_str("[worker-lost]");
                push_worker(&mut line, e);
                push_status(&mut line, e);
            }
            EventKind::WorkerExited => {
                line.push_str("[worker-exited]");
                push_worker(&mut line, e);
                push_status(&mut line, e);
            }
            EventKind::WorkerKilled => {
                line.push_str("[worker-killed]");
                push_worker(&mut line, e);
                push_status(&mut line, e);
            }
            EventKind::SubscriberOverflow => {
                let _ = write!(
                    line,
                    "[subscriber-overflow] subscriber={} reason={}",
                    e.subscriber.unwrap_or("?"),
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
            EventKind::SubscriberPanicked => {
                let _ = write!(
                    line,
                    "[subscriber-panicked] subscriber={} panic={}",
                    e.subscriber.unwrap_or("?"),
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        line
    }
}

fn push_worker(line: &mut String, e: &Event) {
    if let Some(id) = e.worker {
        let _ = write!(line, " worker=#{id}");
    }
    if let Some(role) = e.role {
        let _ = write!(line, " role={role}");
    }
    if let Some(pid) = e.pid {
        let _ = write!(line, " pid={pid}");
    }
}

fn push_status(line: &mut String, e: &Event) {
    if let Some(status) = e.reason.as_deref() {
        let _ = write!(line, " status={status}");
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        println!("{}", Self::render(e));
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

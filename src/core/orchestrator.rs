//! # Orchestrator: spawns the fleet, drives the waves, tears everything down.
//!
//! The [`Orchestrator`] owns the event bus, the control plane and the fleet
//! for the duration of one run.
//!
//! ## High-level flow
//! ```text
//! run(total)
//!   ├─ validate total + WaveSchedule           (nothing spawned on error)
//!   ├─ narration listener: Bus ─► SubscriberSet ─► LogWriter / Timeline / ...
//!   ├─ spawn fleet: N × cpu, 1 × memory, 1 × log   (Launcher)
//!   │     ├─ interrupt checked before each spawn ─► teardown
//!   │     └─ spawn error ─► teardown ─► Err(LoadError::Spawn)
//!   ├─ select!
//!   │     ├─ wave loop: for phase in plan(total)
//!   │     │      sleep_until(start + offset); poll liveness;
//!   │     │      BurnSignal set (ON) / clear (OFF)
//!   │     └─ interrupt (SIGINT/SIGTERM/SIGQUIT)
//!   └─ teardown
//!         BurnSignal clear ─► StopSignal set (once) ─► close control pipes
//!         └─ Fleet::shutdown(grace): wait ─► kill survivors ─► wait
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use loadwave::{Config, LogWriter, Orchestrator, SelfExec};
//!
//! # async fn demo() -> Result<(), loadwave::LoadError> {
//! let report = Orchestrator::new(Config::default(), Arc::new(SelfExec::current()?))
//!     .with_subscribers(vec![Arc::new(LogWriter::new())])
//!     .run(Duration::from_secs(35))
//!     .await?;
//! assert!(report.all_reaped());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::fleet::{Fleet, WorkerState, WorkerSummary};
use crate::core::launcher::Launcher;
use crate::core::schedule::{PhaseKind, WaveSchedule};
use crate::core::shutdown;
use crate::error::LoadError;
use crate::events::{Bus, Event, EventKind};
use crate::signal::{BurnSignal, ControlPlane, StopSignal};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::workers::WorkerSpec;

/// Why the wave loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The requested total duration elapsed.
    DeadlineReached,
    /// The operator interrupted the run.
    Interrupted,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Why the wave loop ended.
    pub outcome: RunOutcome,
    /// Number of phases (ON or OFF) that were started.
    pub phases: u32,
    /// Final state of every worker, in spawn order.
    pub workers: Vec<WorkerSummary>,
}

impl RunReport {
    /// True when every worker process has been reaped.
    pub fn all_reaped(&self) -> bool {
        self.workers.iter().all(|w| w.state.is_terminal())
    }

    /// Number of workers that had to be killed.
    pub fn force_killed(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::ForceKilled)
            .count()
    }
}

/// Per-run signal handles.
struct Signals {
    plane: Arc<ControlPlane>,
    burn: BurnSignal,
    stop: StopSignal,
}

/// Load-test orchestrator.
pub struct Orchestrator {
    cfg: Config,
    launcher: Arc<dyn Launcher>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Orchestrator {
    /// Creates an orchestrator starting workers through `launcher`.
    pub fn new(cfg: Config, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            cfg,
            launcher,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the narration subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runs for `total`, or until SIGINT/SIGTERM/SIGQUIT.
    ///
    /// Interruption is a normal outcome ([`RunOutcome::Interrupted`]).
    pub async fn run(&self, total: Duration) -> Result<RunReport, LoadError> {
        self.run_until(total, shutdown::interrupted()).await
    }

    /// Like [`run`](Self::run), with `interrupt` standing in for OS signals.
    ///
    /// When this returns, no worker process is left alive.
    pub async fn run_until<F>(&self, total: Duration, interrupt: F) -> Result<RunReport, LoadError>
    where
        F: Future<Output = ()>,
    {
        if total.is_zero() {
            return Err(LoadError::InvalidDuration {
                input: total.as_secs().to_string(),
                reason: "must be greater than zero",
            });
        }
        let schedule = WaveSchedule::from_config(&self.cfg)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let narration = self.subscriber_listener(&bus);

        let result = self.drive(&bus, schedule, total, interrupt).await;

        drop(bus);
        if let Err(e) = narration.await {
            warn!(error = %e, "narration listener failed");
        }
        result
    }

    /// Forwards bus events to the subscriber set until every sender is gone.
    fn subscriber_listener(&self, bus: &Bus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let mut set = SubscriberSet::new(self.subscribers.clone());
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "narration lagged; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            let stats = set.shutdown().await;
            if stats.dropped > 0 {
                warn!(delivered = stats.delivered, dropped = stats.dropped, "narration incomplete");
            }
        })
    }

    async fn drive<F>(
        &self,
        bus: &Bus,
        schedule: WaveSchedule,
        total: Duration,
        interrupt: F,
    ) -> Result<RunReport, LoadError>
    where
        F: Future<Output = ()>,
    {
        let plane = ControlPlane::new();
        let signals = Signals {
            burn: BurnSignal::new(Arc::clone(&plane)),
            stop: StopSignal::new(Arc::clone(&plane)),
            plane,
        };
        let mut fleet = Fleet::new(Arc::clone(&signals.plane), bus.clone());

        let mut interrupt = pin!(interrupt);
        let mut interrupted = false;

        let specs = WorkerSpec::fleet(&self.cfg);
        let cpu_workers = self.cfg.cpu_worker_count();
        info!(?total, cpu_workers, workers = specs.len(), "starting load test");
        bus.publish(
            Event::new(EventKind::RunStarting)
                .with_duration(total)
                .with_count(cpu_workers),
        );

        for spec in &specs {
            // the first poll installs the OS handlers; later signals are queued
            if interrupt.as_mut().now_or_never().is_some() {
                interrupted = true;
                break;
            }
            if let Err(e) = fleet.spawn(self.launcher.as_ref(), spec).await {
                warn!(error = %e, spawned = fleet.len(), "spawn failed; stopping the fleet");
                if let Err(err) = self.teardown(bus, &signals, &mut fleet).await {
                    warn!(error = %err, "teardown after spawn failure incomplete");
                }
                bus.publish(Event::new(EventKind::RunFinished));
                return Err(e);
            }
        }

        let started = Instant::now();
        let mut phases = 0u32;
        let outcome = if interrupted {
            RunOutcome::Interrupted
        } else {
            tokio::select! {
                _ = drive_waves(bus, &signals.burn, &mut fleet, schedule, total, started, &mut phases) => {
                    RunOutcome::DeadlineReached
                }
                _ = interrupt => RunOutcome::Interrupted,
            }
        };

        let offset = started.elapsed();
        match outcome {
            RunOutcome::DeadlineReached => {
                bus.publish(Event::new(EventKind::DeadlineReached).with_offset(offset));
            }
            RunOutcome::Interrupted => {
                info!(?offset, "interrupted; shutting down");
                bus.publish(Event::new(EventKind::ShutdownRequested).with_offset(offset));
            }
        }

        let reaped = self.teardown(bus, &signals, &mut fleet).await;
        bus.publish(Event::new(EventKind::RunFinished));
        reaped?;

        let report = RunReport {
            outcome,
            phases,
            workers: fleet.summaries(),
        };
        info!(
            ?outcome,
            phases,
            force_killed = report.force_killed(),
            "load test finished"
        );
        Ok(report)
    }

    /// BurnSignal clear, StopSignal set, then two-phase reaping.
    async fn teardown(
        &self,
        bus: &Bus,
        signals: &Signals,
        fleet: &mut Fleet,
    ) -> Result<(), LoadError> {
        signals.burn.clear().await;
        if let Some(reached) = signals.stop.set().await {
            bus.publish(
                Event::new(EventKind::StopBroadcast)
                    .with_duration(self.cfg.grace)
                    .with_count(reached),
            );
        }
        fleet.mark_stop_requested();
        // EOF on the control pipe is a stop too; closing now also covers
        // workers that missed the frame.
        signals.plane.detach_all().await;
        fleet.shutdown(self.cfg.grace).await
    }
}

/// Runs every phase of `schedule` for `total`, measured from `started`.
///
/// Each phase starts at `started + offset`, so a slow transition does not
/// push later ones back.
async fn drive_waves(
    bus: &Bus,
    burn: &BurnSignal,
    fleet: &mut Fleet,
    schedule: WaveSchedule,
    total: Duration,
    started: Instant,
    phases: &mut u32,
) {
    for phase in schedule.plan(total) {
        tokio::time::sleep_until(started + phase.offset).await;
        fleet.poll_liveness();

        let (kind, reached) = match phase.kind {
            PhaseKind::On => (EventKind::WaveUp, burn.set().await),
            PhaseKind::Off => (EventKind::WaveDown, burn.clear().await),
        };
        bus.publish(
            Event::new(kind)
                .with_wave(phase.wave)
                .with_offset(started.elapsed())
                .with_duration(phase.duration)
                .with_count(reached),
        );
        *phases += 1;
    }
    tokio::time::sleep_until(started + total).await;
    fleet.poll_liveness();
}

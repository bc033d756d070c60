//! # loadwave
//!
//! **loadwave** is a synthetic resource-load generator. It starts a fleet of
//! worker **processes** that each saturate one resource (CPU, memory, log
//! volume), drives them through a fixed ON/OFF wave for a bounded time, and
//! then tears them down gracefully, killing whatever does not stop in time.
//!
//! It exists to check that a monitoring stack (metrics plus log collection)
//! really sees a stressed host.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - WaveSchedule (ON 20s / OFF 10s, cut at the deadline)           │
//! │  - ControlPlane (BurnSignal, StopSignal)                          │
//! │  - Fleet (owns every child process)                               │
//! │  - Bus ─► SubscriberSet ─► LogWriter / Timeline / custom          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        │ stdin frames     │                  │
//!        ▼ B / b / S        ▼                  ▼
//!   ┌──────────┐ ×N    ┌──────────┐       ┌──────────┐
//!   │   cpu    │       │  memory  │       │   log    │
//!   │ (burn on │       │ (+50MB / │       │ (logger  │
//!   │  demand) │       │   5s)    │       │  / 0.5s) │
//!   └──────────┘       └──────────┘       └──────────┘
//!        │                  │                  │
//!        └──────── exit status / liveness ─────┘
//!                           ▼
//!                      Orchestrator
//! ```
//!
//! ### Lifecycle
//! ```text
//! run(total)
//!   ├─► spawn N cpu + 1 memory + 1 log   (spawn error ─► stop the rest ─► Err)
//!   ├─► for phase in plan(total):  ON ─► BurnSignal set   OFF ─► BurnSignal clear
//!   │       (interrupted by SIGINT / SIGTERM / SIGQUIT at any point)
//!   └─► BurnSignal clear ─► StopSignal set ─► wait ≤ grace ─► kill survivors ─► wait
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                         |
//! |-------------------|-----------------------------------------------------------|--------------------------------------------|
//! | **Orchestration** | Wave loop and two-phase shutdown of a process fleet.      | [`Orchestrator`], [`RunReport`]            |
//! | **Scheduling**    | Pure ON/OFF phase planning.                               | [`WaveSchedule`], [`Phase`]                |
//! | **Signals**       | Cross-process flags over per-worker control pipes.        | [`BurnSignal`], [`StopSignal`], [`ControlListener`] |
//! | **Workers**       | CPU, memory and log load generators.                      | [`Worker`], [`WorkerSpec`]                 |
//! | **Subscriber API**| Hook into run events (narration, recording, custom).      | [`Subscribe`], [`LogWriter`], [`Timeline`] |
//! | **Errors**        | Typed errors for the orchestrator and the workers.        | [`LoadError`], [`WorkerError`]             |
//! | **Configuration** | Fixed defaults, overridable from the library API.         | [`Config`]                                 |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use loadwave::{Config, LogWriter, Orchestrator, RunOutcome, SelfExec, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let orch = Orchestrator::new(Config::default(), Arc::new(SelfExec::current()?))
//!         .with_subscribers(subs);
//!
//!     let report = orch.run(Duration::from_secs(35)).await?;
//!     assert!(report.all_reaped());
//!     if report.outcome == RunOutcome::Interrupted {
//!         println!("stopped early after {} phases", report.phases);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod signal;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use config::{Config, parse_duration_secs};
pub use crate::core::{
    Launcher, Orchestrator, Phase, PhaseKind, Plan, RunOutcome, RunReport, SelfExec,
    WaveSchedule, WorkerState, WorkerSummary,
};
pub use error::{LoadError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use signal::{BurnSignal, ControlFrame, ControlListener, ControlPlane, SignalFlag, StopSignal};
pub use subscribers::{
    LogWriter, NarrationStats, Subscribe, SubscriberSet, Timeline, TimelineEntry,
};
pub use workers::{
    ChunkAllocator, CpuWorker, HeapAllocator, LogLine, LogSink, LogWorker, LoggerCommand,
    MemoryGrowth, MemoryLedger, MemoryState, MemoryWorker, Severity, Worker, WorkerRole,
    WorkerSpec, run_process,
};

use std::sync::Arc;
use std::time::Duration;

use loadwave::{
    Config, EventKind, Launcher, Orchestrator, RunOutcome, SelfExec, Timeline, WorkerRole,
    WorkerSpec, WorkerState,
};
use tokio::process::Command;

/// Short timings so a full run takes about a second.
fn fast_config() -> Config {
    Config {
        wave_on: Duration::from_millis(300),
        wave_off: Duration::from_millis(200),
        grace: Duration::from_secs(3),
        cpu_workers: 2,
        cpu_idle_poll: Duration::from_millis(5),
        memory_chunk_mb: 1,
        memory_interval: Duration::from_millis(100),
        memory_ceiling_mb: 8,
        log_interval: Duration::from_millis(100),
        log_timeout: Duration::from_millis(500),
        log_program: "true".into(),
        ..Config::default()
    }
}

fn self_exec() -> Arc<SelfExec> {
    Arc::new(SelfExec::new(env!("CARGO_BIN_EXE_loadwave")))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_run_follows_the_wave_and_reaps_everyone() {
    let timeline = Arc::new(Timeline::new());
    let orch = Orchestrator::new(fast_config(), self_exec()).with_subscribers(vec![timeline.clone()]);

    let report = orch.run_until(Duration::from_secs(1), std::future::pending()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::DeadlineReached);
    assert_eq!(report.phases, 4);
    assert_eq!(report.workers.len(), 4);
    assert!(report.all_reaped());
    assert_eq!(report.force_killed(), 0);
    assert!(report.workers.iter().all(|w| w.state == WorkerState::Exited));
    assert_eq!(
        report.workers.iter().map(|w| w.role).collect::<Vec<_>>(),
        [WorkerRole::Cpu, WorkerRole::Cpu, WorkerRole::Memory, WorkerRole::Log]
    );

    let boundaries = timeline.wave_boundaries().await;
    let expected = [
        (EventKind::WaveUp, 0),
        (EventKind::WaveDown, 300),
        (EventKind::WaveUp, 500),
        (EventKind::WaveDown, 800),
    ];
    assert_eq!(boundaries.len(), expected.len());
    for ((kind, at), (want_kind, want_ms)) in boundaries.iter().zip(expected) {
        assert_eq!(*kind, want_kind);
        let want = Duration::from_millis(want_ms);
        assert!(*at >= want, "{kind:?} at {at:?}, expected {want:?}");
        assert!(*at < want + Duration::from_millis(250), "{kind:?} late: {at:?}");
    }

    assert_eq!(timeline.count(EventKind::DeadlineReached).await, 1);
    assert_eq!(timeline.count(EventKind::StopBroadcast).await, 1);
    assert_eq!(timeline.count(EventKind::AllStoppedWithinGrace).await, 1);
    assert_eq!(timeline.count(EventKind::WorkerExited).await, 4);
    assert_eq!(timeline.count(EventKind::RunFinished).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interruption_goes_straight_to_shutdown() {
    let cfg = Config {
        wave_on: Duration::from_secs(20),
        ..fast_config()
    };
    let timeline = Arc::new(Timeline::new());
    let orch = Orchestrator::new(cfg, self_exec()).with_subscribers(vec![timeline.clone()]);

    let started = std::time::Instant::now();
    let report = orch
        .run_until(Duration::from_secs(60), tokio::time::sleep(Duration::from_millis(400)))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.phases, 1);
    assert!(report.all_reaped());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(timeline.count(EventKind::ShutdownRequested).await, 1);
    assert_eq!(timeline.count(EventKind::DeadlineReached).await, 0);
}

/// Starts a program that ignores the control pipe entirely.
#[cfg(unix)]
struct Deaf;

#[cfg(unix)]
impl Launcher for Deaf {
    fn command(&self, _spec: &WorkerSpec) -> Command {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        cmd
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unresponsive_workers_are_killed_after_grace() {
    let cfg = Config {
        grace: Duration::from_millis(300),
        cpu_workers: 1,
        ..fast_config()
    };
    let timeline = Arc::new(Timeline::new());
    let orch = Orchestrator::new(cfg, Arc::new(Deaf)).with_subscribers(vec![timeline.clone()]);

    let started = std::time::Instant::now();
    let report = orch.run_until(Duration::from_millis(500), std::future::pending()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.force_killed(), 3);
    assert!(report.all_reaped());
    assert_eq!(timeline.count(EventKind::GraceExceeded).await, 1);
    assert_eq!(timeline.count(EventKind::WorkerKilled).await, 3);
}

/// Starts a program that exits immediately.
#[cfg(unix)]
struct Quitter;

#[cfg(unix)]
impl Launcher for Quitter {
    fn command(&self, _spec: &WorkerSpec) -> Command {
        Command::new("true")
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn early_exits_are_narrated_and_the_run_continues() {
    let cfg = Config {
        cpu_workers: 1,
        ..fast_config()
    };
    let timeline = Arc::new(Timeline::new());
    let orch = Orchestrator::new(cfg, Arc::new(Quitter)).with_subscribers(vec![timeline.clone()]);

    let report = orch.run_until(Duration::from_secs(1), std::future::pending()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::DeadlineReached);
    assert_eq!(report.phases, 4);
    assert!(report.workers.iter().all(|w| w.state == WorkerState::Exited));
    assert_eq!(timeline.count(EventKind::WorkerLost).await, 3);
}

#[tokio::test]
async fn spawn_failure_is_an_error_naming_the_role() {
    let orch = Orchestrator::new(fast_config(), Arc::new(SelfExec::new("/nonexistent/loadwave")));
    let err = orch
        .run_until(Duration::from_secs(1), std::future::pending())
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "spawn_failed");
    assert!(err.to_string().contains("cpu"), "{err}");
}

#[tokio::test]
async fn zero_length_wave_is_rejected() {
    let cfg = Config {
        wave_on: Duration::ZERO,
        ..fast_config()
    };
    let err = Orchestrator::new(cfg, self_exec())
        .run_until(Duration::from_secs(1), std::future::pending())
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "invalid_config");
}

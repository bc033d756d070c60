//! # Load workers.
//!
//! Each worker saturates one resource dimension inside its own OS process:
//! - [`CpuWorker`] spins while the BurnSignal is set;
//! - [`MemoryWorker`] grows a [`MemoryLedger`] on a timer;
//! - [`LogWorker`] pushes synthetic lines through a [`LogSink`].
//!
//! A worker process is described by a [`WorkerSpec`] (which doubles as the
//! hidden `worker` CLI subcommand) and entered through [`run_process`].
//!
//! ```text
//! orchestrator                         worker process
//!   Launcher ── spawn(spec args) ──►   run_process(spec)
//!   ControlPlane ── stdin frames ──►     ControlListener ─► SignalFlag / stop token
//!                                        Worker::run(stop)
//! ```

mod cpu;
mod log;
mod memory;

pub use cpu::CpuWorker;
pub use log::{LogLine, LogSink, LogWorker, LoggerCommand, Severity};
pub use memory::{
    ChunkAllocator, HeapAllocator, MemoryGrowth, MemoryLedger, MemoryState, MemoryWorker,
};

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Subcommand;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::shutdown::wait_for_shutdown_signal;
use crate::error::WorkerError;
use crate::signal::ControlListener;

/// Resource dimension a worker saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    /// CPU burner.
    Cpu,
    /// Memory grower.
    Memory,
    /// Log emitter.
    Log,
}

impl WorkerRole {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Cpu => "cpu",
            WorkerRole::Memory => "memory",
            WorkerRole::Log => "log",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # Long-running, stoppable load generator.
///
/// `run` returns when `stop` is cancelled. Implementations must observe the
/// token at least once per work slice so exit latency stays bounded.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Resource this worker loads.
    fn role(&self) -> WorkerRole;

    /// Generates load until `stop` is cancelled.
    async fn run(&self, stop: CancellationToken) -> Result<(), WorkerError>;
}

/// Sleeps for `dur` unless `stop` fires first.
///
/// Returns `true` when the worker should exit.
pub(crate) async fn pause(stop: &CancellationToken, dur: Duration) -> bool {
    tokio::select! {
        _ = stop.cancelled() => true,
        _ = tokio::time::sleep(dur) => stop.is_cancelled(),
    }
}

/// Parameters of one worker process.
///
/// Parsed from the hidden `worker` subcommand in the child, rendered back to
/// arguments by [`WorkerSpec::to_args`] in the orchestrator.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum WorkerSpec {
    /// Burn CPU while the BurnSignal is set.
    Cpu {
        /// Idle sleep between BurnSignal checks, in milliseconds.
        #[arg(long)]
        idle_poll_ms: u64,
    },
    /// Grow resident memory in fixed chunks.
    Memory {
        /// Chunk size in MB.
        #[arg(long)]
        chunk_mb: u64,
        /// Delay between chunks, in milliseconds.
        #[arg(long)]
        interval_ms: u64,
        /// Ceiling on held memory in MB (0 = none).
        #[arg(long, default_value_t = 0)]
        ceiling_mb: u64,
    },
    /// Emit synthetic log lines through an external command.
    Log {
        /// Delay between lines, in milliseconds.
        #[arg(long)]
        interval_ms: u64,
        /// Timeout of one logging command, in milliseconds.
        #[arg(long)]
        timeout_ms: u64,
        /// Logging program.
        #[arg(long)]
        program: PathBuf,
        /// Tag passed to the logging program.
        #[arg(long)]
        tag: String,
    },
}

impl WorkerSpec {
    /// Role of the described worker.
    pub fn role(&self) -> WorkerRole {
        match self {
            WorkerSpec::Cpu { .. } => WorkerRole::Cpu,
            WorkerSpec::Memory { .. } => WorkerRole::Memory,
            WorkerSpec::Log { .. } => WorkerRole::Log,
        }
    }

    /// The full fleet for `cfg`: every CPU worker, then memory, then log.
    pub fn fleet(cfg: &Config) -> Vec<WorkerSpec> {
        let cpu = WorkerSpec::Cpu {
            idle_poll_ms: millis(cfg.cpu_idle_poll),
        };
        let mut specs = vec![cpu; cfg.cpu_worker_count()];
        specs.push(WorkerSpec::Memory {
            chunk_mb: cfg.memory_chunk_mb,
            interval_ms: millis(cfg.memory_interval),
            ceiling_mb: cfg.memory_ceiling_mb,
        });
        specs.push(WorkerSpec::Log {
            interval_ms: millis(cfg.log_interval),
            timeout_ms: millis(cfg.log_timeout),
            program: cfg.log_program.clone(),
            tag: cfg.log_tag.clone(),
        });
        specs
    }

    /// Subcommand arguments that parse back into `self`.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.role().as_str().into()];
        let mut push = |flag: &str, value: OsString| {
            args.push(flag.into());
            args.push(value);
        };
        match self {
            WorkerSpec::Cpu { idle_poll_ms } => {
                push("--idle-poll-ms", idle_poll_ms.to_string().into());
            }
            WorkerSpec::Memory {
                chunk_mb,
                interval_ms,
                ceiling_mb,
            } => {
                push("--chunk-mb", chunk_mb.to_string().into());
                push("--interval-ms", interval_ms.to_string().into());
                push("--ceiling-mb", ceiling_mb.to_string().into());
            }
            WorkerSpec::Log {
                interval_ms,
                timeout_ms,
                program,
                tag,
            } => {
                push("--interval-ms", interval_ms.to_string().into());
                push("--timeout-ms", timeout_ms.to_string().into());
                push("--program", program.clone().into_os_string());
                push("--tag", tag.into());
            }
        }
        args
    }

    /// Validates the parameters and builds the worker.
    ///
    /// Signals are taken from `listener`, which must be the one fed by this
    /// process's control pipe.
    pub fn build(&self, listener: &ControlListener) -> Result<Box<dyn Worker>, WorkerError> {
        match self {
            WorkerSpec::Cpu { idle_poll_ms } => {
                positive("idle-poll-ms", *idle_poll_ms)?;
                Ok(Box::new(CpuWorker::new(
                    listener.burn(),
                    Duration::from_millis(*idle_poll_ms),
                )))
            }
            WorkerSpec::Memory {
                chunk_mb,
                interval_ms,
                ceiling_mb,
            } => {
                positive("chunk-mb", *chunk_mb)?;
                positive("interval-ms", *interval_ms)?;
                let ceiling = (*ceiling_mb > 0).then_some(*ceiling_mb);
                Ok(Box::new(MemoryWorker::new(
                    *chunk_mb,
                    Duration::from_millis(*interval_ms),
                    ceiling,
                )))
            }
            WorkerSpec::Log {
                interval_ms,
                timeout_ms,
                program,
                tag,
            } => {
                positive("interval-ms", *interval_ms)?;
                positive("timeout-ms", *timeout_ms)?;
                if tag.is_empty() {
                    return Err(WorkerError::InvalidArgs {
                        reason: "tag must not be empty".into(),
                    });
                }
                let sink = LoggerCommand::new(
                    program.clone(),
                    tag.clone(),
                    Duration::from_millis(*timeout_ms),
                );
                Ok(Box::new(LogWorker::new(
                    Arc::new(sink),
                    Duration::from_millis(*interval_ms),
                )))
            }
        }
    }
}

fn positive(name: &str, value: u64) -> Result<(), WorkerError> {
    if value == 0 {
        return Err(WorkerError::InvalidArgs {
            reason: format!("{name} must be greater than zero"),
        });
    }
    Ok(())
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Body of a worker process.
///
/// Starts the control listener on stdin, then drives the worker on a
/// current-thread runtime until StopSignal (or the end of the control pipe).
/// SIGINT/SIGTERM delivered to the worker itself are treated as StopSignal.
pub fn run_process(spec: WorkerSpec) -> Result<(), WorkerError> {
    let listener = ControlListener::new();
    let worker = spec.build(&listener)?;
    listener.spawn(std::io::stdin())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let pid = std::process::id();
    let role = worker.role();
    info!(pid, %role, "worker started");

    let result = runtime.block_on(async move {
        let stop = listener.stop_token();
        let on_signal = stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = wait_for_shutdown_signal() => match res {
                    Ok(()) => on_signal.cancel(),
                    Err(e) => warn!(error = %e, "signal handlers unavailable; relying on control pipe"),
                },
                _ = on_signal.cancelled() => {}
            }
        });
        worker.run(stop).await
    });

    info!(pid, %role, ok = result.is_ok(), "worker exiting");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_orders_cpu_then_memory_then_log() {
        let cfg = Config {
            cpu_workers: 3,
            ..Config::default()
        };
        let roles: Vec<_> = WorkerSpec::fleet(&cfg).iter().map(WorkerSpec::role).collect();
        assert_eq!(
            roles,
            vec![
                WorkerRole::Cpu,
                WorkerRole::Cpu,
                WorkerRole::Cpu,
                WorkerRole::Memory,
                WorkerRole::Log
            ]
        );
    }

    #[test]
    fn args_render_role_first() {
        let spec = WorkerSpec::Memory {
            chunk_mb: 50,
            interval_ms: 5000,
            ceiling_mb: 0,
        };
        let args: Vec<String> = spec
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["memory", "--chunk-mb", "50", "--interval-ms", "5000", "--ceiling-mb", "0"]
        );
    }

    #[test]
    fn zero_parameters_are_rejected() {
        let listener = ControlListener::new();
        let spec = WorkerSpec::Memory {
            chunk_mb: 0,
            interval_ms: 10,
            ceiling_mb: 0,
        };
        let err = spec.build(&listener).err().expect("must reject");
        assert_eq!(err.as_label(), "invalid_args");
        assert!(err.to_string().contains("chunk-mb"));
    }

    #[test]
    fn built_worker_reports_its_role() {
        let listener = ControlListener::new();
        let spec = WorkerSpec::Cpu { idle_poll_ms: 10 };
        assert_eq!(spec.build(&listener).unwrap().role(), WorkerRole::Cpu);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_returns_early_on_stop() {
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let started = tokio::time::Instant::now();
        assert!(pause(&stop, Duration::from_secs(60)).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}

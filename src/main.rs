//! # loadwave
//!
//! Command line entry point.
//!
//! ```bash
//! # 35 seconds: ON 20s, OFF 10s, ON 5s, then shutdown
//! loadwave 35
//!
//! # more diagnostics from the orchestrator and the workers
//! RUST_LOG=debug loadwave 35
//! ```
//!
//! The same binary is also the worker: the orchestrator re-executes it as
//! `loadwave worker <cpu|memory|log> [options]` (hidden from `--help`).

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

use loadwave::{
    Config, LoadError, LogWriter, Orchestrator, RunReport, SelfExec, WorkerSpec,
    parse_duration_secs, run_process,
};

/// Synthetic CPU / memory / log load in ON/OFF waves.
#[derive(Parser, Debug)]
#[command(name = "loadwave")]
#[command(version, long_about = None)]
#[command(
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true,
    disable_help_subcommand = true
)]
struct Cli {
    /// Total run time in whole seconds
    #[arg(
        value_name = "DURATION_SECS",
        required = true,
        allow_negative_numbers = true,
        value_parser = parse_duration_secs
    )]
    duration: Option<Duration>,

    /// Anything after the duration; rejected with a usage error.
    #[arg(hide = true)]
    extra: Vec<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single worker (started by the orchestrator)
    #[command(hide = true)]
    Worker {
        #[command(subcommand)]
        spec: WorkerSpec,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    if let Some(Command::Worker { spec }) = cli.command {
        return match run_process(spec) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => failed(e.as_label(), &e.to_string()),
        };
    }

    if let Some(arg) = cli.extra.first() {
        Cli::command()
            .error(
                ErrorKind::TooManyValues,
                format!("unexpected argument '{arg}': expected a single DURATION_SECS"),
            )
            .exit();
    }

    let Some(total) = cli.duration else {
        Cli::command()
            .error(ErrorKind::MissingRequiredArgument, "DURATION_SECS is required")
            .exit();
    };

    match orchestrate(total) {
        Ok(report) if report.all_reaped() => ExitCode::SUCCESS,
        Ok(report) => {
            error!(workers = ?report.workers, "some workers were not reaped");
            ExitCode::FAILURE
        }
        Err(e) => failed(e.as_label(), &e.as_message()),
    }
}

/// Reports a fatal error once, on stderr.
fn failed(label: &'static str, message: &str) -> ExitCode {
    error!(label, "{message}");
    ExitCode::FAILURE
}

fn orchestrate(total: Duration) -> Result<RunReport, LoadError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(LoadError::Runtime)?;

    runtime.block_on(async {
        Orchestrator::new(Config::default(), Arc::new(SelfExec::current()?))
            .with_subscribers(vec![Arc::new(LogWriter::new())])
            .run(total)
            .await
    })
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

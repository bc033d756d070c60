//! How worker processes get started.

use std::path::PathBuf;

use tokio::process::Command;

use crate::error::LoadError;
use crate::workers::WorkerSpec;

/// Builds the command that starts one worker process.
///
/// The fleet owns stdio and lifetime settings (control pipe on stdin,
/// kill-on-drop); a launcher only chooses program and arguments.
pub trait Launcher: Send + Sync + 'static {
    /// Command for the worker described by `spec`.
    fn command(&self, spec: &WorkerSpec) -> Command;
}

/// Re-executes a `loadwave` binary with the hidden `worker` subcommand.
#[derive(Debug, Clone)]
pub struct SelfExec {
    program: PathBuf,
}

impl SelfExec {
    /// Launcher running `program worker <role> [options]`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Launcher re-executing the running binary.
    pub fn current() -> Result<Self, LoadError> {
        let program = std::env::current_exe().map_err(LoadError::Runtime)?;
        Ok(Self::new(program))
    }
}

impl Launcher for SelfExec {
    fn command(&self, spec: &WorkerSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("worker").args(spec.to_args());
        cmd
    }
}

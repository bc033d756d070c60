//! Error types used by the orchestrator and by worker processes.
//!
//! This module defines two main error enums:
//!
//! - [`LoadError`]: errors raised by the orchestrator itself (fatal for the run).
//! - [`WorkerError`]: errors raised inside a worker process (handled locally).
//!
//! Both provide a stable `as_label()` for logs; [`LoadError`] also has
//! `as_message()` for narration.

use std::time::Duration;
use thiserror::Error;

use crate::workers::WorkerRole;

/// # Errors produced by the orchestrator.
///
/// Every variant aborts the run. Input errors are raised before any worker is
/// spawned; everything else is raised only after the workers already spawned
/// have been shut down.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoadError {
    /// Total duration argument is not a positive whole number of seconds.
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration {
        /// Raw operator input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A worker process could not be started.
    #[error("failed to spawn {role} worker: {source}")]
    Spawn {
        /// Role of the worker that failed to start.
        role: WorkerRole,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on (or killing) a worker process failed.
    #[error("failed to reap worker #{worker}: {source}")]
    Wait {
        /// Fleet-local worker id.
        worker: u32,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Run parameters that make no schedule (zero-length wave halves).
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: &'static str,
    },

    /// The async runtime could not be built.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl LoadError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use loadwave::LoadError;
    ///
    /// let err = LoadError::InvalidDuration { input: "0".into(), reason: "must be positive" };
    /// assert_eq!(err.as_label(), "invalid_duration");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::InvalidDuration { .. } => "invalid_duration",
            LoadError::Spawn { .. } => "spawn_failed",
            LoadError::Wait { .. } => "wait_failed",
            LoadError::InvalidConfig { .. } => "invalid_config",
            LoadError::Runtime(_) => "runtime_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoadError::InvalidDuration { input, reason } => {
                format!("duration {input:?} rejected: {reason}")
            }
            LoadError::Spawn { role, source } => format!("spawn {role}: {source}"),
            LoadError::Wait { worker, source } => format!("reap #{worker}: {source}"),
            LoadError::InvalidConfig { reason } => format!("config rejected: {reason}"),
            LoadError::Runtime(e) => format!("runtime: {e}"),
        }
    }

    /// True for errors caused by operator input (reported before anything runs).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            LoadError::InvalidDuration { .. } | LoadError::InvalidConfig { .. }
        )
    }
}

/// # Errors produced inside a worker process.
///
/// None of these cross the process boundary: the orchestrator only ever sees
/// the worker's exit status.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The next memory chunk could not be obtained.
    #[error("out of memory: could not add {requested_mb}MB (holding {held_mb}MB)")]
    Exhausted {
        /// Size of the chunk that failed.
        requested_mb: u64,
        /// Memory already held when the failure happened.
        held_mb: u64,
    },

    /// The external logging command failed or could not be started.
    #[error("log emission failed: {reason}")]
    Emit {
        /// Failure description.
        reason: String,
    },

    /// The external logging command did not finish in time.
    #[error("log emission timed out after {timeout:?}")]
    EmitTimeout {
        /// Configured emission timeout.
        timeout: Duration,
    },

    /// Worker was started with unusable parameters.
    #[error("invalid worker arguments: {reason}")]
    InvalidArgs {
        /// What was wrong.
        reason: String,
    },

    /// Worker runtime failure (runtime build, control pipe).
    #[error("worker runtime error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use loadwave::WorkerError;
    /// use std::time::Duration;
    ///
    /// let err = WorkerError::EmitTimeout { timeout: Duration::from_millis(500) };
    /// assert_eq!(err.as_label(), "emit_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Exhausted { .. } => "memory_exhausted",
            WorkerError::Emit { .. } => "emit_failed",
            WorkerError::EmitTimeout { .. } => "emit_timeout",
            WorkerError::InvalidArgs { .. } => "invalid_args",
            WorkerError::Io(_) => "worker_io",
        }
    }

    /// Indicates whether the worker keeps running after this error.
    ///
    /// Exhaustion and emission failures are absorbed by the worker that hit
    /// them; argument and runtime errors end the worker process.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            WorkerError::Exhausted { .. } | WorkerError::Emit { .. } | WorkerError::EmitTimeout { .. }
        )
    }
}

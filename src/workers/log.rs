//! # Log worker.
//!
//! Emits one synthetic line per interval through a [`LogSink`]. The default
//! sink, [`LoggerCommand`], runs the system `logger` utility with a bounded
//! timeout; failures are counted and the worker keeps going.
//!
//! Line format:
//! ```text
//! WARNING: Dynamic log message from PID 4242. Value: 7310
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Worker, WorkerRole, pause};
use crate::error::WorkerError;

/// Severity of a synthetic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

impl Severity {
    const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Error];

    /// Upper-case label used as the message prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    /// Syslog `facility.level` passed to the logging command.
    pub fn priority(&self) -> &'static str {
        match self {
            Severity::Info => "user.info",
            Severity::Warning => "user.warning",
            Severity::Error => "user.err",
        }
    }

    /// Uniformly random severity.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// One synthetic log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Line severity.
    pub severity: Severity,
    /// Random payload in `1000..=9999`.
    pub value: u32,
    /// Rendered message.
    pub message: String,
}

impl LogLine {
    /// Builds a line for `pid` with the given severity and payload.
    pub fn new(pid: u32, severity: Severity, value: u32) -> Self {
        let message = format!(
            "{}: Dynamic log message from PID {pid}. Value: {value}",
            severity.as_str()
        );
        Self {
            severity,
            value,
            message,
        }
    }

    /// Random severity and payload.
    pub fn random(pid: u32) -> Self {
        let value = rand::rng().random_range(1000..=9999);
        Self::new(pid, Severity::random(), value)
    }
}

/// Destination of synthetic log lines.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    /// Delivers one line. Must return within a bounded time.
    async fn emit(&self, severity: Severity, message: &str) -> Result<(), WorkerError>;
}

/// Runs `<program> -t <tag> -p <priority> <message>` per line.
#[derive(Debug, Clone)]
pub struct LoggerCommand {
    program: PathBuf,
    tag: String,
    timeout: Duration,
}

impl LoggerCommand {
    /// Creates a sink running `program` with `tag`, killed after `timeout`.
    pub fn new(program: impl Into<PathBuf>, tag: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            tag: tag.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LogSink for LoggerCommand {
    async fn emit(&self, severity: Severity, message: &str) -> Result<(), WorkerError> {
        let mut child = Command::new(&self.program)
            .arg("-t")
            .arg(&self.tag)
            .arg("-p")
            .arg(severity.priority())
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Emit {
                reason: format!("spawn {}: {e}", self.program.display()),
            })?;

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(WorkerError::Emit {
                reason: status.to_string(),
            }),
            Ok(Err(e)) => Err(WorkerError::Emit {
                reason: e.to_string(),
            }),
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "failed to kill timed out logger");
                }
                Err(WorkerError::EmitTimeout {
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// Emits a line per interval until stop.
pub struct LogWorker {
    sink: Arc<dyn LogSink>,
    interval: Duration,
}

impl LogWorker {
    /// Creates a worker writing to `sink` every `interval`.
    pub fn new(sink: Arc<dyn LogSink>, interval: Duration) -> Self {
        Self { sink, interval }
    }
}

#[async_trait]
impl Worker for LogWorker {
    fn role(&self) -> WorkerRole {
        WorkerRole::Log
    }

    async fn run(&self, stop: CancellationToken) -> Result<(), WorkerError> {
        let pid = std::process::id();
        let (mut sent, mut failed) = (0u64, 0u64);

        while !stop.is_cancelled() {
            let line = LogLine::random(pid);
            match self.sink.emit(line.severity, &line.message).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    warn!(pid, label = e.as_label(), error = %e, "log emission failed");
                }
            }
            if pause(&stop, self.interval).await {
                break;
            }
        }

        info!(pid, sent, failed, "log worker stopping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording {
        lines: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl LogSink for Recording {
        async fn emit(&self, _severity: Severity, message: &str) -> Result<(), WorkerError> {
            self.lines.lock().await.push(message.to_string());
            if self.fail {
                return Err(WorkerError::Emit {
                    reason: "exit status: 1".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn message_format() {
        let line = LogLine::new(4242, Severity::Warning, 7310);
        assert_eq!(
            line.message,
            "WARNING: Dynamic log message from PID 4242. Value: 7310"
        );
    }

    #[test]
    fn random_lines_stay_in_range() {
        for _ in 0..200 {
            let line = LogLine::random(1);
            assert!((1000..=9999).contains(&line.value));
            assert!(line.message.starts_with(line.severity.as_str()));
        }
    }

    async fn run_for(sink: Arc<Recording>, elapsed: Duration) -> usize {
        let worker = LogWorker::new(sink.clone(), Duration::from_millis(500));
        let stop = CancellationToken::new();
        let handle = tokio::spawn({
            let stop = stop.clone();
            async move { worker.run(stop).await }
        });
        tokio::time::sleep(elapsed).await;
        stop.cancel();
        handle.await.unwrap().unwrap();
        sink.lines.lock().await.len()
    }

    #[tokio::test(start_paused = true)]
    async fn emits_on_interval_until_stop() {
        let sink = Arc::new(Recording::default());
        assert_eq!(run_for(sink, Duration::from_millis(1050)).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_going_after_failures() {
        let sink = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        assert_eq!(run_for(sink, Duration::from_millis(1050)).await, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn logger_command_reports_exit_status() {
        let ok = LoggerCommand::new("true", "LoadTest", Duration::from_secs(5));
        ok.emit(Severity::Info, "hello").await.unwrap();

        let bad = LoggerCommand::new("false", "LoadTest", Duration::from_secs(5));
        let err = bad.emit(Severity::Error, "hello").await.unwrap_err();
        assert_eq!(err.as_label(), "emit_failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_is_an_emit_failure() {
        let missing = LoggerCommand::new("/nonexistent/logger", "LoadTest", Duration::from_secs(1));
        let err = missing.emit(Severity::Info, "hello").await.unwrap_err();
        assert_eq!(err.as_label(), "emit_failed");
        assert!(err.is_local());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_is_killed_after_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("loadwave-slow-logger-{}", std::process::id()));
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let slow = LoggerCommand::new(&script, "LoadTest", Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = slow.emit(Severity::Info, "hello").await.unwrap_err();
        let _ = std::fs::remove_file(&script);

        assert_eq!(err.as_label(), "emit_timeout");
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}

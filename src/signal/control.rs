//! # Orchestrator side of the control plane.
//!
//! [`ControlPlane`] owns the write end of every worker's control pipe and fans
//! each [`ControlFrame`] out to all of them. [`BurnSignal`] and [`StopSignal`]
//! are the two flags built on top of it; each keeps a local mirror so the
//! orchestrator can read its own signal without touching the pipes.
//!
//! ## Rules
//! - A pipe whose worker already exited fails with `EPIPE`; it is detached and
//!   the frame is dropped for that worker only.
//! - `StopSignal::set` broadcasts at most once, no matter how often it is called.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::Mutex;
use tracing::debug;

use super::frame::ControlFrame;

/// Write end of one worker's control pipe.
struct Pipe {
    worker: u32,
    stdin: ChildStdin,
}

impl Pipe {
    async fn send(&mut self, frame: ControlFrame) -> std::io::Result<()> {
        self.stdin.write_all(&[frame.as_byte()]).await?;
        self.stdin.flush().await
    }
}

/// Fan-out of control frames to every attached worker.
pub struct ControlPlane {
    pipes: Mutex<Vec<Pipe>>,
}

impl ControlPlane {
    /// Creates an empty control plane.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pipes: Mutex::new(Vec::new()),
        })
    }

    /// Attaches the control pipe of a freshly spawned worker.
    pub async fn attach(&self, worker: u32, stdin: ChildStdin) {
        self.pipes.lock().await.push(Pipe { worker, stdin });
    }

    /// Sends `frame` to every attached worker.
    ///
    /// Returns the number of workers the frame reached. Pipes that fail are
    /// detached.
    pub async fn broadcast(&self, frame: ControlFrame) -> usize {
        let mut pipes = self.pipes.lock().await;
        let mut kept = Vec::with_capacity(pipes.len());

        for mut pipe in pipes.drain(..) {
            match pipe.send(frame).await {
                Ok(()) => kept.push(pipe),
                Err(e) => {
                    debug!(worker = pipe.worker, frame = frame.as_str(), error = %e, "control pipe detached");
                }
            }
        }

        let reached = kept.len();
        *pipes = kept;
        reached
    }

    /// Closes every pipe. Workers observe EOF, which they treat as stop.
    pub async fn detach_all(&self) {
        self.pipes.lock().await.clear();
    }

    /// True if no pipe is attached.
    pub async fn is_empty(&self) -> bool {
        self.pipes.lock().await.is_empty()
    }
}

/// CPU burn flag: freely toggled by the orchestrator, read by CPU workers.
pub struct BurnSignal {
    plane: Arc<ControlPlane>,
    state: AtomicBool,
}

impl BurnSignal {
    /// Creates a clear burn signal on top of `plane`.
    pub fn new(plane: Arc<ControlPlane>) -> Self {
        Self {
            plane,
            state: AtomicBool::new(false),
        }
    }

    /// Sets the flag. Returns the number of workers reached.
    pub async fn set(&self) -> usize {
        self.state.store(true, Ordering::SeqCst);
        self.plane.broadcast(ControlFrame::BurnSet).await
    }

    /// Clears the flag. Returns the number of workers reached.
    pub async fn clear(&self) -> usize {
        self.state.store(false, Ordering::SeqCst);
        self.plane.broadcast(ControlFrame::BurnClear).await
    }

    /// Current value as last written by the orchestrator.
    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }
}

/// Write-once stop flag shared by every worker.
pub struct StopSignal {
    plane: Arc<ControlPlane>,
    state: AtomicBool,
}

impl StopSignal {
    /// Creates an unset stop signal on top of `plane`.
    pub fn new(plane: Arc<ControlPlane>) -> Self {
        Self {
            plane,
            state: AtomicBool::new(false),
        }
    }

    /// Sets the flag and broadcasts it.
    ///
    /// Returns `Some(reached)` for the call that performed the transition and
    /// `None` for every later call.
    pub async fn set(&self) -> Option<usize> {
        if self.state.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.plane.broadcast(ControlFrame::Stop).await)
    }

    /// True once [`set`](Self::set) has been called.
    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }
}

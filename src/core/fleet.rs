//! # Fleet: registry of live worker processes.
//!
//! The fleet is the only owner of the child handles, so it is the only place
//! that can wait on or kill a worker. Each spawned worker gets a fleet-local
//! id, and its stdin is attached to the [`ControlPlane`].
//!
//! ## Lifecycle
//! ```text
//! Spawned ──(seen alive)──► Running ──(StopSignal)──► StopRequested ─┬─► Exited
//!    │                         │                                     └─► ForceKilled
//!    └────────(exits early)────┴──► Exited   (narrated as WorkerLost)
//! ```
//!
//! ## Rules
//! - Every child is spawned with `kill_on_drop`, so dropping the fleet never
//!   leaves an orphan behind.
//! - [`Fleet::shutdown`] shares one grace deadline across all workers, then
//!   kills the survivors and waits for each of them without a time bound.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::launcher::Launcher;
use crate::error::LoadError;
use crate::events::{Bus, Event, EventKind};
use crate::signal::ControlPlane;
use crate::workers::{WorkerRole, WorkerSpec};

/// Lifecycle state of one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process started; not yet observed alive at a phase boundary.
    Spawned,
    /// Observed alive.
    Running,
    /// StopSignal sent; waiting for a voluntary exit.
    StopRequested,
    /// Exited on its own and reaped.
    Exited,
    /// Killed after the grace period and reaped.
    ForceKilled,
}

impl WorkerState {
    /// True once the process has been reaped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Exited | WorkerState::ForceKilled)
    }
}

/// Final view of one worker, part of the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Fleet-local id (1-based, spawn order).
    pub id: u32,
    /// Worker role.
    pub role: WorkerRole,
    /// OS pid at spawn time.
    pub pid: Option<u32>,
    /// Last known state.
    pub state: WorkerState,
    /// Exit status, once reaped.
    pub status: Option<String>,
}

struct Member {
    id: u32,
    role: WorkerRole,
    pid: Option<u32>,
    child: Child,
    state: WorkerState,
    status: Option<String>,
}

impl Member {
    fn event(&self, kind: EventKind) -> Event {
        let ev = Event::new(kind)
            .with_worker(self.id, self.role)
            .with_pid(self.pid);
        match &self.status {
            Some(status) => ev.with_reason(status.as_str()),
            None => ev,
        }
    }

    fn reaped(&mut self, state: WorkerState, status: ExitStatus) {
        self.state = state;
        self.status = Some(status.to_string());
    }
}

/// Owner of every worker process of one run.
pub(crate) struct Fleet {
    members: Vec<Member>,
    plane: Arc<ControlPlane>,
    bus: Bus,
    next_id: u32,
}

impl Fleet {
    pub(crate) fn new(plane: Arc<ControlPlane>, bus: Bus) -> Self {
        Self {
            members: Vec::new(),
            plane,
            bus,
            next_id: 0,
        }
    }

    /// Starts one worker and attaches its control pipe.
    pub(crate) async fn spawn(
        &mut self,
        launcher: &dyn Launcher,
        spec: &WorkerSpec,
    ) -> Result<u32, LoadError> {
        let role = spec.role();
        let mut cmd = launcher.command(spec);
        cmd.stdin(Stdio::piped()).kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.bus.publish(
                    Event::new(EventKind::WorkerSpawnFailed)
                        .with_role(role)
                        .with_reason(source.to_string()),
                );
                return Err(LoadError::Spawn { role, source });
            }
        };

        self.next_id += 1;
        let id = self.next_id;
        match child.stdin.take() {
            Some(stdin) => self.plane.attach(id, stdin).await,
            None => warn!(worker = id, %role, "worker spawned without a control pipe"),
        }

        let member = Member {
            id,
            role,
            pid: child.id(),
            child,
            state: WorkerState::Spawned,
            status: None,
        };
        debug!(worker = id, %role, pid = ?member.pid, "worker spawned");
        self.bus.publish(member.event(EventKind::WorkerSpawned));
        self.members.push(member);
        Ok(id)
    }

    /// Number of workers spawned so far.
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Non-blocking liveness poll.
    ///
    /// Workers that already exited are reaped and narrated as
    /// [`EventKind::WorkerLost`]. Returns how many were lost by this call.
    pub(crate) fn poll_liveness(&mut self) -> usize {
        let bus = &self.bus;
        let mut lost = 0;
        for m in self.members.iter_mut().filter(|m| !m.state.is_terminal()) {
            match m.child.try_wait() {
                Ok(Some(status)) => {
                    m.reaped(WorkerState::Exited, status);
                    warn!(worker = m.id, role = %m.role, %status, "worker exited early");
                    bus.publish(m.event(EventKind::WorkerLost));
                    lost += 1;
                }
                Ok(None) => {
                    if m.state == WorkerState::Spawned {
                        m.state = WorkerState::Running;
                    }
                }
                Err(e) => warn!(worker = m.id, error = %e, "liveness poll failed"),
            }
        }
        lost
    }

    /// Moves every live worker to [`WorkerState::StopRequested`].
    pub(crate) fn mark_stop_requested(&mut self) {
        for m in self.members.iter_mut().filter(|m| !m.state.is_terminal()) {
            m.state = WorkerState::StopRequested;
        }
    }

    /// Two-phase reaping: voluntary exit within `grace`, then kill and wait.
    ///
    /// Every worker is reaped before this returns. The first wait failure, if
    /// any, is returned after all workers have been handled.
    pub(crate) async fn shutdown(&mut self, grace: Duration) -> Result<(), LoadError> {
        let deadline = Instant::now() + grace;
        let bus = &self.bus;
        let mut first_err: Option<LoadError> = None;
        let mut stuck = Vec::new();

        for (idx, m) in self.members.iter_mut().enumerate() {
            if m.state.is_terminal() {
                continue;
            }
            match tokio::time::timeout_at(deadline, m.child.wait()).await {
                Ok(Ok(status)) => {
                    m.reaped(WorkerState::Exited, status);
                    bus.publish(m.event(EventKind::WorkerExited));
                }
                Ok(Err(source)) => {
                    warn!(worker = m.id, error = %source, "wait failed; will kill");
                    first_err.get_or_insert(LoadError::Wait { worker: m.id, source });
                    stuck.push(idx);
                }
                Err(_elapsed) => stuck.push(idx),
            }
        }

        if stuck.is_empty() {
            bus.publish(Event::new(EventKind::AllStoppedWithinGrace));
            return first_err.map_or(Ok(()), Err);
        }

        let ids = stuck
            .iter()
            .map(|&idx| format!("#{}", self.members[idx].id))
            .collect::<Vec<_>>()
            .join(",");
        warn!(stuck = stuck.len(), workers = %ids, ?grace, "grace exceeded; killing");
        bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_count(stuck.len())
                .with_reason(ids),
        );

        for idx in stuck {
            let m = &mut self.members[idx];
            if let Err(e) = m.child.start_kill() {
                debug!(worker = m.id, error = %e, "kill failed; process may be gone");
            }
            match m.child.wait().await {
                Ok(status) => {
                    m.reaped(WorkerState::ForceKilled, status);
                    info!(worker = m.id, role = %m.role, %status, "worker killed");
                    bus.publish(m.event(EventKind::WorkerKilled));
                }
                Err(source) => {
                    warn!(worker = m.id, error = %source, "failed to reap killed worker");
                    first_err.get_or_insert(LoadError::Wait { worker: m.id, source });
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Snapshot of every worker.
    pub(crate) fn summaries(&self) -> Vec<WorkerSummary> {
        self.members
            .iter()
            .map(|m| WorkerSummary {
                id: m.id,
                role: m.role,
                pid: m.pid,
                state: m.state,
                status: m.status.clone(),
            })
            .collect()
    }
}

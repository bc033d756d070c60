//! # Operator interruption.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal. Both sides use it: the orchestrator turns it into the
//! shutdown path, a worker process turns it into its StopSignal.
//!
//! **Unix:** `SIGINT` (Ctrl-C), `SIGTERM`, `SIGQUIT`.
//! **Elsewhere:** Ctrl-C via [`tokio::signal::ctrl_c`].

use tracing::warn;

/// Waits for a termination signal.
///
/// Each call installs independent listeners. Fails only if registration fails.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Each call installs independent listeners. Fails only if registration fails.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Completes on operator interruption; never completes if the handlers
/// cannot be installed (the run then ends at its deadline).
pub(crate) async fn interrupted() {
    if let Err(e) = wait_for_shutdown_signal().await {
        warn!(error = %e, "shutdown signal handlers unavailable; run ends at its deadline");
        std::future::pending::<()>().await;
    }
}

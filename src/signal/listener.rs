//! # Worker side of the control plane.
//!
//! [`ControlListener`] runs a dedicated OS thread that reads the control pipe
//! and applies frames to local state:
//! - `B` / `b` toggle the burn [`SignalFlag`];
//! - `S`, EOF, or a read error cancel the stop [`CancellationToken`].
//!
//! The thread is independent of the worker's async runtime, so a CPU worker
//! spinning on its only runtime thread still observes frames immediately.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::frame::ControlFrame;

/// Read-only view of a boolean signal inside a worker process.
#[derive(Clone, Debug, Default)]
pub struct SignalFlag(Arc<AtomicBool>);

impl SignalFlag {
    /// Creates a clear flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking read of the current value.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self, value: bool) {
        self.0.store(value, Ordering::Relaxed);
    }
}

/// Decodes control frames into a burn flag and a stop token.
#[derive(Clone, Default)]
pub struct ControlListener {
    burn: SignalFlag,
    stop: CancellationToken,
}

impl ControlListener {
    /// Creates a listener with burn clear and stop unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Burn flag fed by this listener.
    pub fn burn(&self) -> SignalFlag {
        self.burn.clone()
    }

    /// Stop token fed by this listener; cancelled exactly when stop is observed.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Starts the reader thread over `reader` (the process stdin in a worker).
    pub fn spawn<R>(&self, reader: R) -> std::io::Result<JoinHandle<()>>
    where
        R: Read + Send + 'static,
    {
        let me = self.clone();
        std::thread::Builder::new()
            .name("control-listener".into())
            .spawn(move || me.read_loop(reader))
    }

    /// Applies one decoded frame.
    pub fn apply(&self, frame: ControlFrame) {
        match frame {
            ControlFrame::BurnSet => self.burn.store(true),
            ControlFrame::BurnClear => self.burn.store(false),
            ControlFrame::Stop => self.stop.cancel(),
        }
    }

    fn read_loop<R: Read>(&self, mut reader: R) {
        let mut buf = [0u8; 64];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("control pipe closed; stopping");
                    self.stop.cancel();
                    return;
                }
                Ok(n) => {
                    for &byte in &buf[..n] {
                        match ControlFrame::from_byte(byte) {
                            Some(frame) => self.apply(frame),
                            None => warn!(byte, "ignoring unknown control byte"),
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "control pipe read failed; stopping");
                    self.stop.cancel();
                    return;
                }
            }
        }
    }
}

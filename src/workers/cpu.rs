//! CPU worker: spins while the BurnSignal is set, sleeps while it is clear.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Worker, WorkerRole, pause};
use crate::error::WorkerError;
use crate::signal::SignalFlag;

const BURN_SLICE: Duration = Duration::from_millis(10);

/// Burns one processing unit on demand.
pub struct CpuWorker {
    burn: SignalFlag,
    idle_poll: Duration,
    slice: Duration,
    slices: AtomicU64,
}

impl CpuWorker {
    /// Creates a worker reading `burn`.
    pub fn new(burn: SignalFlag, idle_poll: Duration) -> Self {
        Self {
            burn,
            idle_poll,
            slice: BURN_SLICE,
            slices: AtomicU64::new(0),
        }
    }

    /// Number of burn slices executed so far.
    pub fn burn_slices(&self) -> u64 {
        self.slices.load(Ordering::Relaxed)
    }
}

/// Busy arithmetic until `slice` has elapsed on the wall clock.
fn spin(slice: Duration, mut acc: u64) -> u64 {
    let deadline = Instant::now() + slice;
    let mut i: u64 = 0;
    while Instant::now() < deadline {
        for _ in 0..4096 {
            acc = black_box(acc.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(i));
            i = i.wrapping_add(1);
        }
    }
    acc
}

#[async_trait]
impl Worker for CpuWorker {
    fn role(&self) -> WorkerRole {
        WorkerRole::Cpu
    }

    async fn run(&self, stop: CancellationToken) -> Result<(), WorkerError> {
        let pid = std::process::id();
        let mut acc = u64::from(pid);
        info!(pid, "cpu worker ready");

        while !stop.is_cancelled() {
            if self.burn.is_set() {
                acc = spin(self.slice, acc);
                self.slices.fetch_add(1, Ordering::Relaxed);
                // lets the signal task observe SIGTERM between slices
                tokio::task::yield_now().await;
            } else if pause(&stop, self.idle_poll).await {
                break;
            }
        }

        let _ = black_box(acc);
        info!(pid, burn_slices = self.burn_slices(), "cpu worker stopping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::signal::{ControlFrame, ControlListener};

    #[test]
    fn spin_takes_at_least_one_slice() {
        let started = Instant::now();
        spin(Duration::from_millis(5), 1);
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn idles_without_burn_and_exits_on_stop() {
        let listener = ControlListener::new();
        let worker = Arc::new(CpuWorker::new(listener.burn(), Duration::from_millis(5)));
        let stop = listener.stop_token();

        let handle = tokio::spawn({
            let worker = Arc::clone(&worker);
            let stop = stop.clone();
            async move { worker.run(stop).await }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        listener.apply(ControlFrame::Stop);

        handle.await.unwrap().unwrap();
        assert_eq!(worker.burn_slices(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn burns_while_set_and_stops_within_a_slice() {
        let listener = ControlListener::new();
        listener.apply(ControlFrame::BurnSet);
        let worker = Arc::new(CpuWorker::new(listener.burn(), Duration::from_millis(5)));

        let handle = tokio::spawn({
            let worker = Arc::clone(&worker);
            let stop = listener.stop_token();
            async move { worker.run(stop).await }
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        listener.apply(ControlFrame::Stop);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker must observe stop")
            .unwrap()
            .unwrap();
        assert!(worker.burn_slices() > 0);
    }
}

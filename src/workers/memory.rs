//! # Memory worker.
//!
//! Grows resident memory one chunk per interval and never gives it back before
//! exit.
//!
//! ```text
//! Growing ──(allocation failure / ceiling)──► Holding ──(stop)──► exit
//!    └──────────────────────(stop)─────────────────────────────► exit
//! ```
//!
//! Chunks are reserved fallibly and then filled, so every page is touched and
//! the memory is actually resident rather than merely reserved.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Worker, WorkerRole, pause};
use crate::error::WorkerError;

const MB: u64 = 1024 * 1024;

/// Source of memory chunks.
pub trait ChunkAllocator: Send + Sync {
    /// Returns a resident buffer of `bytes`, or `None` when memory is exhausted.
    fn allocate(&self, bytes: usize) -> Option<Vec<u8>>;
}

/// Heap-backed allocator that touches every page.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl ChunkAllocator for HeapAllocator {
    fn allocate(&self, bytes: usize) -> Option<Vec<u8>> {
        let mut chunk = Vec::new();
        chunk.try_reserve_exact(bytes).ok()?;
        // non-zero fill defeats zero-page sharing
        chunk.resize(bytes, 0xA5);
        Some(chunk)
    }
}

/// Append-only record of held chunks.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    chunks: Vec<Vec<u8>>,
    total_bytes: u64,
}

impl MemoryLedger {
    fn push(&mut self, chunk: Vec<u8>) {
        self.total_bytes += chunk.len() as u64;
        self.chunks.push(chunk);
    }

    /// Cumulative held memory in MB.
    pub fn total_mb(&self) -> u64 {
        self.total_bytes / MB
    }

    /// Number of chunks held.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True before the first successful allocation.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Growth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryState {
    /// Allocating a chunk every interval.
    Growing,
    /// Allocation failed; everything held so far is kept until stop.
    Holding,
}

/// Ledger plus its state machine.
#[derive(Debug)]
pub struct MemoryGrowth {
    ledger: MemoryLedger,
    state: MemoryState,
}

impl Default for MemoryGrowth {
    fn default() -> Self {
        Self {
            ledger: MemoryLedger::default(),
            state: MemoryState::Growing,
        }
    }
}

impl MemoryGrowth {
    /// Empty ledger in [`MemoryState::Growing`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> MemoryState {
        self.state
    }

    /// Held chunks.
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Adds one `chunk_mb` chunk.
    ///
    /// Returns the new total in MB. A chunk that cannot be obtained, or that
    /// would push the total past `ceiling_mb`, switches to
    /// [`MemoryState::Holding`] and yields [`WorkerError::Exhausted`]. In
    /// `Holding` this is a no-op returning the held total.
    pub fn grow(
        &mut self,
        alloc: &dyn ChunkAllocator,
        chunk_mb: u64,
        ceiling_mb: Option<u64>,
    ) -> Result<u64, WorkerError> {
        let held_mb = self.ledger.total_mb();
        if self.state == MemoryState::Holding {
            return Ok(held_mb);
        }

        let over_ceiling = ceiling_mb.is_some_and(|cap| held_mb.saturating_add(chunk_mb) > cap);
        let chunk = if over_ceiling {
            None
        } else {
            chunk_mb
                .checked_mul(MB)
                .and_then(|bytes| usize::try_from(bytes).ok())
                .and_then(|bytes| alloc.allocate(bytes))
        };

        match chunk {
            Some(chunk) => {
                self.ledger.push(chunk);
                Ok(self.ledger.total_mb())
            }
            None => {
                self.state = MemoryState::Holding;
                Err(WorkerError::Exhausted {
                    requested_mb: chunk_mb,
                    held_mb,
                })
            }
        }
    }
}

/// Grows memory until exhaustion, then holds it until stop.
pub struct MemoryWorker {
    chunk_mb: u64,
    interval: Duration,
    ceiling_mb: Option<u64>,
    allocator: Box<dyn ChunkAllocator>,
}

impl MemoryWorker {
    /// Heap-backed worker.
    pub fn new(chunk_mb: u64, interval: Duration, ceiling_mb: Option<u64>) -> Self {
        Self::with_allocator(chunk_mb, interval, ceiling_mb, Box::new(HeapAllocator))
    }

    /// Worker drawing chunks from `allocator`.
    pub fn with_allocator(
        chunk_mb: u64,
        interval: Duration,
        ceiling_mb: Option<u64>,
        allocator: Box<dyn ChunkAllocator>,
    ) -> Self {
        Self {
            chunk_mb,
            interval,
            ceiling_mb,
            allocator,
        }
    }
}

#[async_trait]
impl Worker for MemoryWorker {
    fn role(&self) -> WorkerRole {
        WorkerRole::Memory
    }

    async fn run(&self, stop: CancellationToken) -> Result<(), WorkerError> {
        let pid = std::process::id();
        let mut growth = MemoryGrowth::new();

        while !stop.is_cancelled() {
            match growth.grow(self.allocator.as_ref(), self.chunk_mb, self.ceiling_mb) {
                Ok(total_mb) => info!(pid, total_mb, "allocated {}MB", self.chunk_mb),
                Err(e) => {
                    warn!(pid, error = %e, "memory exhausted; holding");
                    break;
                }
            }
            if pause(&stop, self.interval).await {
                break;
            }
        }

        if growth.state() == MemoryState::Holding {
            stop.cancelled().await;
        }

        info!(
            pid,
            held_mb = growth.ledger().total_mb(),
            chunks = growth.ledger().len(),
            "memory worker stopping"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Succeeds `budget` times, then fails.
    struct Budget(AtomicUsize);

    impl ChunkAllocator for Budget {
        fn allocate(&self, bytes: usize) -> Option<Vec<u8>> {
            let left = self.0.load(Ordering::SeqCst);
            if left == 0 {
                return None;
            }
            self.0.store(left - 1, Ordering::SeqCst);
            Some(vec![0; bytes])
        }
    }

    #[test]
    fn total_grows_monotonically() {
        let mut growth = MemoryGrowth::new();
        let mut last = 0;
        for _ in 0..4 {
            let total = growth.grow(&HeapAllocator, 1, None).unwrap();
            assert!(total > last);
            last = total;
        }
        assert_eq!(growth.ledger().total_mb(), 4);
        assert_eq!(growth.ledger().len(), 4);
    }

    #[test]
    fn failure_switches_to_holding_and_keeps_chunks() {
        let alloc = Budget(AtomicUsize::new(2));
        let mut growth = MemoryGrowth::new();

        assert_eq!(growth.grow(&alloc, 1, None).unwrap(), 1);
        assert_eq!(growth.grow(&alloc, 1, None).unwrap(), 2);
        let err = growth.grow(&alloc, 1, None).unwrap_err();

        assert!(matches!(err, WorkerError::Exhausted { requested_mb: 1, held_mb: 2 }));
        assert_eq!(growth.state(), MemoryState::Holding);
        // Holding is sticky and keeps the total.
        alloc.0.store(10, Ordering::SeqCst);
        assert_eq!(growth.grow(&alloc, 1, None).unwrap(), 2);
        assert_eq!(growth.ledger().total_mb(), 2);
    }

    #[test]
    fn ceiling_counts_as_exhaustion() {
        let mut growth = MemoryGrowth::new();
        assert_eq!(growth.grow(&HeapAllocator, 2, Some(3)).unwrap(), 2);
        assert!(growth.grow(&HeapAllocator, 2, Some(3)).is_err());
        assert_eq!(growth.state(), MemoryState::Holding);
        assert_eq!(growth.ledger().total_mb(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn holding_worker_waits_for_stop() {
        let worker = Arc::new(MemoryWorker::with_allocator(
            1,
            Duration::from_secs(5),
            None,
            Box::new(Budget(AtomicUsize::new(1))),
        ));
        let stop = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = Arc::clone(&worker);
            let stop = stop.clone();
            async move { worker.run(stop).await }
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!handle.is_finished());

        stop.cancel();
        handle.await.unwrap().unwrap();
    }
}

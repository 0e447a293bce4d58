//! Lock-free load metrics for the navigation engine.
//!
//! Counters are plain atomics updated from worker threads and read from the
//! owner thread without locking. Timing averages are exponential moving
//! averages stored as `f64` bits.
//!
//! # Usage
//!
//! ```ignore
//! let metrics = engine.metrics();
//! if metrics.should_throttle_new_requests() {
//!     // back off for metrics.recommended_delay() seconds
//! }
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Smoothing factor of the timing averages.
pub const EMA_ALPHA: f64 = 0.1;

/// Pending requests above which new requests should be throttled.
pub const THROTTLE_PENDING: usize = 100;

/// Moving average over `f64` samples stored in an `AtomicU64`.
#[derive(Debug, Default)]
struct AtomicEma(AtomicU64);

impl AtomicEma {
    fn record(&self, sample: f64) {
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let current = f64::from_bits(bits);
            let next = if bits == 0 {
                sample
            } else {
                current + EMA_ALPHA * (sample - current)
            };
            Some(next.to_bits())
        });
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Shared load counters.
#[derive(Debug, Default)]
pub struct LoadMetrics {
    pending_pathfinds: AtomicUsize,
    active_pathfinds: AtomicUsize,
    pending_regen_regions: AtomicUsize,
    active_write_locks: AtomicUsize,

    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    invalidated: AtomicU64,

    avg_pathfind_ms: AtomicEma,
    avg_regen_ms: AtomicEma,
}

/// Plain copy of [`LoadMetrics`] at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoadSnapshot {
    pub pending_pathfinds: usize,
    pub active_pathfinds: usize,
    pub pending_regen_regions: usize,
    pub active_write_locks: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub invalidated: u64,
    pub avg_pathfind_ms: f64,
    pub avg_regen_ms: f64,
}

/// How a request ended, for the outcome counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    Failed,
    Cancelled,
    Invalidated,
}

impl LoadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Pathfinding
    // -------------------------------------------------------------------------

    pub fn request_queued(&self) {
        self.pending_pathfinds.fetch_add(1, Ordering::AcqRel);
    }

    /// A queued request was picked up by a worker.
    pub fn request_started(&self) {
        decrement(&self.pending_pathfinds);
        self.active_pathfinds.fetch_add(1, Ordering::AcqRel);
    }

    /// A started request finished.
    pub fn request_finished(&self, outcome: RequestOutcome, elapsed_ms: f64) {
        decrement(&self.active_pathfinds);
        self.count_outcome(outcome);
        if outcome == RequestOutcome::Completed {
            self.avg_pathfind_ms.record(elapsed_ms);
        }
    }

    /// A queued request ended without being started.
    pub fn request_dropped(&self, outcome: RequestOutcome) {
        decrement(&self.pending_pathfinds);
        self.count_outcome(outcome);
    }

    fn count_outcome(&self, outcome: RequestOutcome) {
        let counter = match outcome {
            RequestOutcome::Completed => &self.completed,
            RequestOutcome::Failed => &self.failed,
            RequestOutcome::Cancelled => &self.cancelled,
            RequestOutcome::Invalidated => &self.invalidated,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    // -------------------------------------------------------------------------
    // Regeneration
    // -------------------------------------------------------------------------

    pub fn regen_queued(&self, regions: usize) {
        self.pending_regen_regions.fetch_add(regions, Ordering::AcqRel);
    }

    pub fn regen_finished(&self, regions: usize, elapsed_ms: f64) {
        let _ = self
            .pending_regen_regions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(regions)));
        self.avg_regen_ms.record(elapsed_ms);
    }

    /// Marks a write lock as held until the guard drops.
    pub fn write_lock_scope(&self) -> WriteLockScope<'_> {
        self.active_write_locks.fetch_add(1, Ordering::AcqRel);
        WriteLockScope { metrics: self }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn pending_pathfinds(&self) -> usize {
        self.pending_pathfinds.load(Ordering::Acquire)
    }

    pub fn active_pathfinds(&self) -> usize {
        self.active_pathfinds.load(Ordering::Acquire)
    }

    pub fn active_write_locks(&self) -> usize {
        self.active_write_locks.load(Ordering::Acquire)
    }

    /// New requests should wait: the queue is deep or a writer holds the store.
    pub fn should_throttle_new_requests(&self) -> bool {
        self.pending_pathfinds() > THROTTLE_PENDING || self.active_write_locks() > 0
    }

    /// Suggested delay in seconds before submitting more work.
    pub fn recommended_delay(&self) -> f64 {
        match self.pending_pathfinds() {
            n if n > 50 => 0.1,
            n if n > 20 => 0.05,
            _ => 0.0,
        }
    }

    pub fn snapshot(&self) -> LoadSnapshot {
        LoadSnapshot {
            pending_pathfinds: self.pending_pathfinds(),
            active_pathfinds: self.active_pathfinds(),
            pending_regen_regions: self.pending_regen_regions.load(Ordering::Acquire),
            active_write_locks: self.active_write_locks(),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            avg_pathfind_ms: self.avg_pathfind_ms.get(),
            avg_regen_ms: self.avg_regen_ms.get(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.pending_pathfinds,
            &self.active_pathfinds,
            &self.pending_regen_regions,
            &self.active_write_locks,
        ] {
            counter.store(0, Ordering::Release);
        }
        for counter in [&self.completed, &self.failed, &self.cancelled, &self.invalidated] {
            counter.store(0, Ordering::Release);
        }
        self.avg_pathfind_ms.reset();
        self.avg_regen_ms.reset();
    }
}

/// Decrements the active write lock count on drop.
pub struct WriteLockScope<'a> {
    metrics: &'a LoadMetrics,
}

impl Drop for WriteLockScope<'_> {
    fn drop(&mut self) {
        decrement(&self.metrics.active_write_locks);
    }
}

fn decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lifecycle_counters() {
        let metrics = LoadMetrics::new();
        metrics.request_queued();
        metrics.request_queued();
        assert_eq!(metrics.pending_pathfinds(), 2);

        metrics.request_started();
        assert_eq!(metrics.pending_pathfinds(), 1);
        assert_eq!(metrics.active_pathfinds(), 1);

        metrics.request_finished(RequestOutcome::Completed, 4.0);
        metrics.request_dropped(RequestOutcome::Cancelled);

        let snap = metrics.snapshot();
        assert_eq!(snap.pending_pathfinds, 0);
        assert_eq!(snap.active_pathfinds, 0);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.cancelled, 1);
        assert_eq!(snap.avg_pathfind_ms, 4.0, "first sample seeds the average");
    }

    #[test]
    fn test_moving_average() {
        let metrics = LoadMetrics::new();
        metrics.regen_queued(2);
        metrics.regen_finished(2, 10.0);
        metrics.regen_finished(0, 20.0);
        let snap = metrics.snapshot();
        assert!((snap.avg_regen_ms - 11.0).abs() < 1e-9);
        assert_eq!(snap.pending_regen_regions, 0);
    }

    #[test]
    fn test_throttle_and_delay() {
        let metrics = LoadMetrics::new();
        assert!(!metrics.should_throttle_new_requests());
        assert_eq!(metrics.recommended_delay(), 0.0);

        {
            let _scope = metrics.write_lock_scope();
            assert!(metrics.should_throttle_new_requests(), "writer active");
        }
        assert!(!metrics.should_throttle_new_requests());

        for _ in 0..21 {
            metrics.request_queued();
        }
        assert_eq!(metrics.recommended_delay(), 0.05);
        for _ in 0..30 {
            metrics.request_queued();
        }
        assert_eq!(metrics.recommended_delay(), 0.1);
        for _ in 0..50 {
            metrics.request_queued();
        }
        assert!(metrics.should_throttle_new_requests());

        metrics.reset();
        assert_eq!(metrics.snapshot(), LoadSnapshot::default());
    }

    /// Counters never underflow.
    #[test]
    fn test_saturating_decrement() {
        let metrics = LoadMetrics::new();
        metrics.request_started();
        metrics.request_finished(RequestOutcome::Failed, 1.0);
        assert_eq!(metrics.pending_pathfinds(), 0);
        assert_eq!(metrics.active_pathfinds(), 0);
        assert_eq!(metrics.snapshot().failed, 1);
    }
}

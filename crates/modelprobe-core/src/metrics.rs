//! Per-run atomic counters.
//!
//! Each run owns one [`RunMetrics`], shared with its probe tasks through an
//! `Arc`. Counters are incremented silently at the call site. Call
//! [`RunMetrics::flush`] to emit current values as a single `tracing::info!`
//! event at the end of the run.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{FailureKind, RunStats};

/// Lightweight atomic counters, no allocations, no locking.
#[derive(Debug, Default)]
pub struct RunMetrics {
    dispatched: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    timed_out: AtomicUsize,
    cancelled: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an adapter call as started; it counts as in flight until the
    /// returned guard drops, including when the call panics.
    pub fn start_call(&self) -> InFlight<'_> {
        self.call_started();
        InFlight { metrics: self }
    }

    /// Mark an adapter call as started and update the in-flight peak.
    pub fn call_started(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tracing::trace!(metric = "in_flight", value = now, "adapter call started");
    }

    /// Mark an adapter call as finished.
    fn call_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        match kind {
            FailureKind::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            FailureKind::Timeout => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot the counters into a serializable [`RunStats`].
    pub fn snapshot(&self, total: usize) -> RunStats {
        RunStats {
            total,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight(),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self, run_id: &str) {
        tracing::info!(
            metric = "flush",
            run_id = %run_id,
            dispatched = self.dispatched(),
            succeeded = self.succeeded.load(Ordering::Relaxed),
            failed = self.failed.load(Ordering::Relaxed),
            timed_out = self.timed_out.load(Ordering::Relaxed),
            cancelled = self.cancelled.load(Ordering::Relaxed),
            peak_in_flight = self.peak_in_flight(),
            in_flight = self.in_flight(),
        );
    }
}

/// Guard returned by [`RunMetrics::start_call`].
#[must_use = "the call stops counting as in flight when the guard drops"]
pub struct InFlight<'a> {
    metrics: &'a RunMetrics,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.call_finished();
    }
}

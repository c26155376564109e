//! Process-wide atomic counters for fault boundaries.
//!
//! Counters are incremented silently at the call site. Call
//! [`BoundaryMetrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. before the process exits).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global boundary counters.
pub static METRICS: BoundaryMetrics = BoundaryMetrics::new();

pub struct BoundaryMetrics {
    faults_captured: AtomicU64,
    recoveries_scheduled: AtomicU64,
    recoveries_completed: AtomicU64,
    manual_retries: AtomicU64,
}

impl Default for BoundaryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryMetrics {
    pub const fn new() -> Self {
        Self {
            faults_captured: AtomicU64::new(0),
            recoveries_scheduled: AtomicU64::new(0),
            recoveries_completed: AtomicU64::new(0),
            manual_retries: AtomicU64::new(0),
        }
    }

    pub fn inc_faults_captured(&self) {
        self.faults_captured.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "faults_captured", "counter incremented");
    }

    pub fn inc_recoveries_scheduled(&self) {
        self.recoveries_scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "recoveries_scheduled", "counter incremented");
    }

    pub fn inc_recoveries_completed(&self) {
        self.recoveries_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "recoveries_completed", "counter incremented");
    }

    pub fn inc_manual_retries(&self) {
        self.manual_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "manual_retries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "boundary.flush",
            faults_captured = self.faults_captured(),
            recoveries_scheduled = self.recoveries_scheduled(),
            recoveries_completed = self.recoveries_completed(),
            manual_retries = self.manual_retries(),
        );
    }

    pub fn faults_captured(&self) -> u64 {
        self.faults_captured.load(Ordering::Relaxed)
    }

    pub fn recoveries_scheduled(&self) -> u64 {
        self.recoveries_scheduled.load(Ordering::Relaxed)
    }

    pub fn recoveries_completed(&self) -> u64 {
        self.recoveries_completed.load(Ordering::Relaxed)
    }

    pub fn manual_retries(&self) -> u64 {
        self.manual_retries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.faults_captured.store(0, Ordering::Relaxed);
        self.recoveries_scheduled.store(0, Ordering::Relaxed);
        self.recoveries_completed.store(0, Ordering::Relaxed);
        self.manual_retries.store(0, Ordering::Relaxed);
    }
}

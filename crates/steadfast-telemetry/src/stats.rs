//! Delivery counters for a dispatcher.
//!
//! Incremented silently at the call site. Call [`DeliveryStats::flush`] to
//! emit current values as a single `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic delivery counters, no locking.
#[derive(Debug)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    logged: AtomicU64,
    suppressed: AtomicU64,
    dropped: AtomicU64,
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryStats {
    pub const fn new() -> Self {
        Self {
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            logged: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// A sink accepted a report.
    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A sink rejected a report or the transport failed.
    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A report was written to the local log instead of transmitted.
    pub fn inc_logged(&self) {
        self.logged.fetch_add(1, Ordering::Relaxed);
    }

    /// A call was a no-op because its category is disabled.
    pub fn inc_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// A report could not be scheduled (no async runtime).
    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "telemetry.flush",
            delivered = self.delivered(),
            failed = self.failed(),
            logged = self.logged(),
            suppressed = self.suppressed(),
            dropped = self.dropped(),
        );
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let stats = DeliveryStats::new();
        stats.inc_delivered();
        stats.inc_delivered();
        stats.inc_failed();
        stats.inc_suppressed();
        assert_eq!(stats.delivered(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.suppressed(), 1);
        assert_eq!(stats.logged(), 0);
        assert_eq!(stats.dropped(), 0);
    }
}

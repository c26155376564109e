//! In-memory sinks (testing only)
//!
//! Provides `MemorySink`, which records every report, and `RejectingSink`,
//! which counts attempts and fails them all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::collector::CollectorSink;
use crate::error::{Result, TelemetryError};
use crate::report::{Report, ReportKind};

/// Sink that keeps every delivered report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<Report>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far, in delivery order.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, kind: ReportKind) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CollectorSink for MemorySink {
    async fn deliver(&self, report: &Report) -> Result<()> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).push(report.clone());
        Ok(())
    }
}

/// Sink that rejects every report with the given status.
#[derive(Debug)]
pub struct RejectingSink {
    status: u16,
    attempts: AtomicUsize,
}

impl RejectingSink {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectorSink for RejectingSink {
    async fn deliver(&self, _report: &Report) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TelemetryError::Rejected {
            status: self.status,
        })
    }
}

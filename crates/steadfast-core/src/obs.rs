//! Structured lifecycle events for fault boundaries.
//!
//! Events are emitted at `info!` level, except captured faults which are
//! `warn!`. Filter with `STEADFAST_LOG`; pass `--json` to the CLI for JSON lines.

use std::time::Duration;

use tracing::{info, warn};

use crate::boundary::FaultRecord;

/// RAII guard that enters a boundary-scoped span.
///
/// ```ignore
/// let _span = BoundarySpan::enter("feed");
/// // events inside carry boundary = "feed"
/// ```
pub struct BoundarySpan {
    _span: tracing::span::EnteredSpan,
}

impl BoundarySpan {
    pub fn enter(boundary: &str) -> Self {
        let span = tracing::info_span!("steadfast.boundary", boundary = %boundary);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_fault_captured(boundary: &str, record: &FaultRecord, retry_count: u32) {
    warn!(
        event = "boundary.fault_captured",
        boundary = %boundary,
        kind = ?record.kind,
        name = %record.name,
        message = %record.message,
        retry_count = retry_count,
    );
}

pub fn emit_recovery_scheduled(boundary: &str, retry_count: u32, delay: Duration) {
    info!(
        event = "boundary.recovery_scheduled",
        boundary = %boundary,
        retry_count = retry_count,
        delay_ms = delay.as_millis() as u64,
    );
}

pub fn emit_recovered(boundary: &str, retry_count: u32) {
    info!(event = "boundary.recovered", boundary = %boundary, retry_count = retry_count);
}

pub fn emit_manual_retry(boundary: &str) {
    info!(event = "boundary.manual_retry", boundary = %boundary);
}

pub fn emit_go_home(boundary: &str) {
    info!(event = "boundary.go_home", boundary = %boundary);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_span_create() {
        let _span = BoundarySpan::enter("test-boundary");
    }
}

//! Structured tracing events for boundary lifecycle transitions.

use std::sync::Arc;
use std::time::Duration;

use steadfast_core::{
    emit_go_home, emit_manual_retry, emit_recovery_scheduled, BoundarySpan, Fault, FaultBoundary,
    BoundaryMetrics,
};
use steadfast_telemetry::fakes::MemorySink;
use steadfast_telemetry::{Dispatcher, DispatcherConfig, Environment};
use tracing_test::traced_test;

fn boundary(config: DispatcherConfig) -> FaultBoundary<()> {
    FaultBoundary::builder()
        .name("inbox")
        .dispatcher(Arc::new(Dispatcher::with_sink(
            config,
            Arc::new(MemorySink::new()),
        )))
        .build()
}

#[traced_test]
#[test]
fn test_emit_helpers_log_event_names() {
    emit_recovery_scheduled("inbox", 1, Duration::from_millis(2000));
    emit_manual_retry("inbox");
    emit_go_home("inbox");

    assert!(logs_contain("boundary.recovery_scheduled"));
    assert!(logs_contain("delay_ms=2000"));
    assert!(logs_contain("boundary.manual_retry"));
    assert!(logs_contain("boundary.go_home"));
}

#[traced_test]
#[test]
fn test_boundary_span_enter_creates_span() {
    let span = BoundarySpan::enter("test-span");
    tracing::info!("inside boundary span");
    drop(span);
    assert!(logs_contain("inside boundary span"));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_recovery_cycle_is_logged() {
    let b = boundary(DispatcherConfig::default());
    let mut rx = b.subscribe();

    b.capture(Fault::new("fetch failed"));
    rx.borrow_and_update();
    rx.changed().await.expect("boundary alive");
    b.retry();

    assert!(logs_contain("boundary.fault_captured"));
    assert!(logs_contain("boundary.recovery_scheduled"));
    assert!(logs_contain("boundary.recovered"));
    assert!(logs_contain("boundary.manual_retry"));
}

#[tokio::test]
#[traced_test]
async fn test_non_production_fault_is_logged_locally() {
    let config = DispatcherConfig::default()
        .with_environment(Environment::NonProduction)
        .with_error_reporting(true);
    let b = boundary(config);

    b.capture(Fault::new("template missing"));

    assert!(logs_contain("telemetry.error_report"));
    assert!(logs_contain("template missing"));
}

#[tokio::test]
#[traced_test]
async fn test_panicking_on_fault_is_logged() {
    let b: FaultBoundary<()> = FaultBoundary::builder()
        .dispatcher(Arc::new(Dispatcher::with_sink(
            DispatcherConfig::default(),
            Arc::new(MemorySink::new()),
        )))
        .on_fault(|_| panic!("callback bug"))
        .build();

    b.capture(Fault::new("bad state"));
    assert!(logs_contain("fault callback panicked"));
}

#[traced_test]
#[test]
fn test_metrics_flush_reports_counters() {
    let metrics = BoundaryMetrics::new();
    metrics.inc_faults_captured();
    metrics.inc_recoveries_scheduled();
    metrics.flush();

    assert!(logs_contain("boundary.flush"));
    assert!(logs_contain("faults_captured=1"));
}

#[tokio::test]
async fn test_global_counters_advance() {
    let before = steadfast_core::METRICS.faults_captured();
    let b = boundary(DispatcherConfig::default());
    b.capture(Fault::new("bad state"));
    b.retry();
    assert!(steadfast_core::METRICS.faults_captured() > before);
    assert!(steadfast_core::METRICS.manual_retries() >= 1);
}

//! Steadfast Core: fault isolation with bounded automatic recovery
//!
//! The [`FaultBoundary`] keeps a failing unit of work from taking down its
//! host, reports the failure through [`steadfast_telemetry`] and retries
//! transient (network-like) failures with exponential backoff.

pub mod boundary;
pub mod logging;
pub mod metrics;
pub mod obs;

pub use boundary::{
    classify, AttemptCounter, BoundaryOptions, BoundaryState, FallbackAction, FallbackScreen,
    Fault, FaultBoundary, FaultDetails, FaultKind, FaultRecord, Phase, RecoveryPolicy, Rendered,
};
pub use logging::init_tracing;
pub use metrics::{BoundaryMetrics, METRICS};
pub use obs::{
    emit_fault_captured, emit_go_home, emit_manual_retry, emit_recovered,
    emit_recovery_scheduled, BoundarySpan,
};

pub use steadfast_telemetry::{Dispatcher, DispatcherConfig};

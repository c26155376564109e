//! Steadfast Telemetry: best-effort reporting for faults, metrics and events
//!
//! The [`Dispatcher`] turns raw faults, measurements and analytics events
//! into normalized [`Report`]s and hands them to a [`CollectorSink`]. It
//! never blocks the caller and never surfaces delivery errors: a failed
//! delivery is logged and dropped.
//!
//! ## Configuration
//!
//! [`DispatcherConfig::from_env`] reads `STEADFAST_ENV`,
//! `STEADFAST_ENABLE_ANALYTICS`, `STEADFAST_ENABLE_ERROR_REPORTING`,
//! `STEADFAST_ENABLE_PERFORMANCE_MONITORING` and `STEADFAST_COLLECTOR_URL`.

pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fakes;
pub mod report;
pub mod stats;
pub mod tracker;

pub use collector::{CollectorSink, HttpCollector};
pub use config::{DispatcherConfig, Environment};
pub use dispatcher::{Dispatch, Dispatcher, WEB_VITAL_PREFIX};
pub use fakes::{MemorySink, RejectingSink};
pub use error::{Result, TelemetryError};
pub use report::{
    AnalyticsEvent, ClientContext, ErrorReport, FaultSummary, PerformanceMetric, Properties,
    Report, ReportKind, WebVital,
};
pub use stats::DeliveryStats;
pub use tracker::PerformanceTracker;

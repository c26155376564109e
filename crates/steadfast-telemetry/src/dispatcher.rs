//! Telemetry dispatcher
//!
//! Every public operation is gated by its own toggle, never panics and
//! never returns an error. In production a report is handed to the
//! collector sink on a spawned task; otherwise it is logged locally.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::collector::{CollectorSink, HttpCollector, UnconfiguredSink};
use crate::config::DispatcherConfig;
use crate::report::{
    AnalyticsEvent, ClientContext, ErrorReport, FaultSummary, PerformanceMetric, Properties,
    Report, WebVital,
};
use crate::stats::DeliveryStats;

/// What happened to a report handed to the dispatcher.
///
/// Callers are free to ignore it; delivery is fire-and-forget.
#[derive(Debug)]
pub enum Dispatch {
    /// The category is disabled by configuration
    Disabled,
    /// Non-production: written to the local log only
    Logged,
    /// Delivery is running on this task
    Spawned(JoinHandle<()>),
    /// No async runtime to deliver on; the report was discarded
    Dropped,
}

impl Dispatch {
    /// Wait for a spawned delivery to finish. No-op for other outcomes.
    pub async fn settled(self) {
        if let Dispatch::Spawned(handle) = self {
            if let Err(e) = handle.await {
                warn!(error = %e, "telemetry delivery task did not complete");
            }
        }
    }
}

/// Normalizes and best-effort delivers error, performance and analytics reports.
pub struct Dispatcher {
    config: DispatcherConfig,
    sink: Arc<dyn CollectorSink>,
    client: ClientContext,
    stats: Arc<DeliveryStats>,
}

/// Prefix that keeps vitals apart from ordinary metrics of the same name.
pub const WEB_VITAL_PREFIX: &str = "web-vital-";

static GLOBAL: OnceLock<Arc<Dispatcher>> = OnceLock::new();

impl Dispatcher {
    /// Create a dispatcher posting to `config.collector_url`.
    ///
    /// An unusable collector URL does not fail construction: deliveries
    /// fail and are logged instead.
    pub fn new(config: DispatcherConfig) -> Self {
        let sink: Arc<dyn CollectorSink> = match HttpCollector::new(&config.collector_url) {
            Ok(collector) => Arc::new(collector),
            Err(e) => {
                warn!(error = %e, "collector unavailable; reports will not be transmitted");
                Arc::new(UnconfiguredSink::new(e.to_string()))
            }
        };
        Self::with_sink(config, sink)
    }

    /// Create a dispatcher delivering to an arbitrary sink
    pub fn with_sink(config: DispatcherConfig, sink: Arc<dyn CollectorSink>) -> Self {
        Dispatcher {
            config,
            sink,
            client: ClientContext::default(),
            stats: Arc::new(DeliveryStats::new()),
        }
    }

    /// Create a dispatcher from environment variables
    pub fn from_env() -> Self {
        Self::new(DispatcherConfig::from_env())
    }

    /// Set the client context stamped on error reports and events
    pub fn with_client_context(mut self, client: ClientContext) -> Self {
        self.client = client;
        self
    }

    /// Process-wide dispatcher, configured from the environment on first use.
    pub fn global() -> Arc<Dispatcher> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Dispatcher::from_env())))
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Report a fault. No-op unless error reporting is enabled.
    pub fn report_error(
        &self,
        fault: impl Into<FaultSummary>,
        context: Option<Value>,
        subject_id: Option<&str>,
    ) -> Dispatch {
        if !self.config.error_reporting_enabled {
            return self.suppressed("error");
        }

        self.dispatch(Report::Error(ErrorReport {
            id: Uuid::new_v4(),
            fault: fault.into(),
            context,
            subject_id: subject_id.map(str::to_string),
            emitted_at: Utc::now(),
            client: self.client.clone(),
        }))
    }

    /// Report a named measurement. No-op unless performance monitoring is enabled.
    pub fn report_performance_metric(
        &self,
        name: &str,
        value: f64,
        metadata: Option<Properties>,
    ) -> Dispatch {
        if !self.config.performance_monitoring_enabled {
            return self.suppressed("performance");
        }

        self.dispatch(Report::Performance(PerformanceMetric {
            id: Uuid::new_v4(),
            name: name.to_string(),
            value,
            emitted_at: Utc::now(),
            metadata,
        }))
    }

    /// Forward a vitals measurement as a `web-vital-<name>` performance metric
    /// tagged with its id and label.
    pub fn report_web_vital(&self, vital: &WebVital) -> Dispatch {
        let metadata = match json!({ "id": vital.id, "label": vital.label }) {
            Value::Object(map) => Some(map),
            _ => None,
        };
        let name = format!("{WEB_VITAL_PREFIX}{}", vital.name);
        self.report_performance_metric(&name, vital.value, metadata)
    }

    /// Record a user-facing analytics event. No-op unless analytics are enabled.
    pub fn track_event(&self, name: &str, properties: Option<Properties>) -> Dispatch {
        if !self.config.analytics_enabled {
            return self.suppressed("analytics");
        }

        self.dispatch(Report::Analytics(AnalyticsEvent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            properties,
            emitted_at: Utc::now(),
            client: self.client.clone(),
        }))
    }

    fn suppressed(&self, category: &'static str) -> Dispatch {
        self.stats.inc_suppressed();
        debug!(category, "telemetry category disabled; report suppressed");
        Dispatch::Disabled
    }

    fn dispatch(&self, report: Report) -> Dispatch {
        if !self.config.environment.is_production() {
            log_locally(&report);
            self.stats.inc_logged();
            return Dispatch::Logged;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    report_id = %report.id(),
                    kind = report.kind().endpoint(),
                    "no async runtime; report dropped"
                );
                self.stats.inc_dropped();
                return Dispatch::Dropped;
            }
        };

        let sink = Arc::clone(&self.sink);
        let stats = Arc::clone(&self.stats);
        let delivery = async move {
            match sink.deliver(&report).await {
                Ok(()) => stats.inc_delivered(),
                Err(e) => {
                    stats.inc_failed();
                    error!(
                        report_id = %report.id(),
                        kind = report.kind().endpoint(),
                        error = %e,
                        "failed to send report"
                    );
                }
            }
        };
        Dispatch::Spawned(runtime.spawn(delivery.instrument(Span::current())))
    }
}

fn log_locally(report: &Report) {
    match report {
        Report::Error(r) => error!(
            event = "telemetry.error_report",
            report_id = %r.id,
            name = %r.fault.name,
            message = %r.fault.message,
            stack = r.fault.stack.as_deref().unwrap_or(""),
            subject_id = r.subject_id.as_deref().unwrap_or(""),
        ),
        Report::Performance(m) => info!(
            event = "telemetry.performance_metric",
            report_id = %m.id,
            name = %m.name,
            value = m.value,
        ),
        Report::Analytics(e) => info!(
            event = "telemetry.analytics_event",
            report_id = %e.id,
            name = %e.name,
            properties = e.properties.as_ref().map(|p| p.len()).unwrap_or(0),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::fakes::MemorySink;

    fn quiet() -> Dispatcher {
        Dispatcher::with_sink(DispatcherConfig::default(), Arc::new(MemorySink::new()))
    }

    #[test]
    fn test_disabled_categories_are_suppressed() {
        let dispatcher = quiet();
        assert!(matches!(
            dispatcher.report_error(FaultSummary::new("Error", "x"), None, None),
            Dispatch::Disabled
        ));
        assert!(matches!(
            dispatcher.report_performance_metric("ttfb", 1.0, None),
            Dispatch::Disabled
        ));
        assert!(matches!(dispatcher.track_event("click", None), Dispatch::Disabled));
        assert_eq!(dispatcher.stats().suppressed(), 3);
    }

    #[test]
    fn test_non_production_logs_without_runtime() {
        let config = DispatcherConfig::default()
            .with_environment(Environment::NonProduction)
            .with_analytics(true);
        let dispatcher = Dispatcher::with_sink(config, Arc::new(MemorySink::new()));
        assert!(matches!(dispatcher.track_event("open", None), Dispatch::Logged));
        assert_eq!(dispatcher.stats().logged(), 1);
    }

    #[test]
    fn test_production_without_runtime_drops() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::with_sink(
            DispatcherConfig::production("http://localhost"),
            sink.clone(),
        );
        assert!(matches!(dispatcher.track_event("open", None), Dispatch::Dropped));
        assert_eq!(dispatcher.stats().dropped(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_invalid_collector_url_does_not_fail_construction() {
        let dispatcher = Dispatcher::new(DispatcherConfig::production("not a url"));
        assert!(dispatcher.config().error_reporting_enabled);
    }
}

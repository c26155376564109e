//! Report value objects sent to the collector.
//!
//! Each report is built at call time, serialized once in camelCase and
//! never retried or persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form key/value metadata attached to metrics and events.
pub type Properties = Map<String, Value>;

/// Normalized description of a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultSummary {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl FaultSummary {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Summarize any error; the `source()` chain becomes the stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            name: "Error".to_string(),
            message: err.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }
}

/// Where a report originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    /// User agent or host identifier
    pub agent: String,
    /// Current location (URL, route, or command)
    pub location: String,
}

impl Default for ClientContext {
    fn default() -> Self {
        ClientContext {
            agent: "server".to_string(),
            location: "server".to_string(),
        }
    }
}

impl ClientContext {
    pub fn new(agent: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            location: location.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub id: Uuid,
    pub fault: FaultSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub emitted_at: DateTime<Utc>,
    pub client: ClientContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub id: Uuid,
    pub name: String,
    pub value: f64,
    pub emitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Properties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    pub emitted_at: DateTime<Utc>,
    pub client: ClientContext,
}

/// A runtime-provided vitals measurement (e.g. LCP, CLS, TTFB).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVital {
    pub name: String,
    pub value: f64,
    pub id: String,
    pub label: String,
}

/// Which collector endpoint a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Error,
    Performance,
    Analytics,
}

impl ReportKind {
    /// Path segment appended to the collector URL.
    pub fn endpoint(self) -> &'static str {
        match self {
            ReportKind::Error => "errors",
            ReportKind::Performance => "performance",
            ReportKind::Analytics => "analytics",
        }
    }
}

/// Any report the dispatcher can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Error(ErrorReport),
    Performance(PerformanceMetric),
    Analytics(AnalyticsEvent),
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Error(_) => ReportKind::Error,
            Report::Performance(_) => ReportKind::Performance,
            Report::Analytics(_) => ReportKind::Analytics,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Report::Error(r) => r.id,
            Report::Performance(r) => r.id,
            Report::Analytics(r) => r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Report::Error(r) => &r.fault.name,
            Report::Performance(r) => &r.name,
            Report::Analytics(r) => &r.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: Inner,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("socket closed")]
    struct Inner;

    #[test]
    fn test_fault_summary_from_error_collects_sources() {
        let err = Outer { inner: Inner };
        let summary = FaultSummary::from_error(&err);
        assert_eq!(summary.message, "outer failure");
        assert_eq!(summary.stack.as_deref(), Some("caused by: socket closed"));
    }

    #[test]
    fn test_error_report_serializes_camel_case() {
        let report = ErrorReport {
            id: Uuid::new_v4(),
            fault: FaultSummary::new("NetworkError", "fetch failed"),
            context: Some(json!({ "component": "feed" })),
            subject_id: Some("user-7".to_string()),
            emitted_at: Utc::now(),
            client: ClientContext::default(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["subjectId"], "user-7");
        assert_eq!(value["fault"]["name"], "NetworkError");
        assert!(value["fault"].get("stack").is_none());
        assert!(value.get("emittedAt").is_some());
        assert_eq!(value["client"]["agent"], "server");
    }

    #[test]
    fn test_report_kind_endpoints() {
        assert_eq!(ReportKind::Error.endpoint(), "errors");
        assert_eq!(ReportKind::Performance.endpoint(), "performance");
        assert_eq!(ReportKind::Analytics.endpoint(), "analytics");
    }
}

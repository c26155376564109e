//! Faults and their classification.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steadfast_telemetry::FaultSummary;

/// Declared name that marks a fault as network-related regardless of message.
pub const NETWORK_ERROR_NAME: &str = "NetworkError";

/// Case-sensitive message fragments that indicate a transient network failure.
const NETWORK_MARKERS: [&str; 3] = ["fetch", "network", "timeout"];

/// Retry eligibility of a rendering fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Transient; eligible for automatic recovery
    NetworkLike,
    /// Permanent; only a manual action leaves the faulted state
    Unrecoverable,
}

/// A failure raised beneath a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self::named("Error", message)
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        Fault {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// A fault explicitly tagged as network-related.
    pub fn network(message: impl Into<String>) -> Self {
        Self::named(NETWORK_ERROR_NAME, message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Wrap any error; its `source()` chain becomes the stack.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let summary = FaultSummary::from_error(err);
        Fault {
            name: summary.name,
            message: summary.message,
            stack: summary.stack,
        }
    }

    /// Build a fault from a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with a non-string payload".to_string()
        };
        Self::named("Panic", message)
    }

    pub fn kind(&self) -> FaultKind {
        classify(&self.name, &self.message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for Fault {}

/// Heuristic classifier: network markers in the message, or the
/// `NetworkError` name, make a fault `NetworkLike`.
pub fn classify(name: &str, message: &str) -> FaultKind {
    if name == NETWORK_ERROR_NAME || NETWORK_MARKERS.iter().any(|m| message.contains(m)) {
        FaultKind::NetworkLike
    } else {
        FaultKind::Unrecoverable
    }
}

/// Immutable record of a captured fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub kind: FaultKind,
    pub name: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl FaultRecord {
    pub fn capture(fault: Fault) -> Self {
        FaultRecord {
            kind: fault.kind(),
            name: fault.name,
            message: fault.message,
            stack_trace: fault.stack,
            occurred_at: Utc::now(),
        }
    }
}

impl From<&FaultRecord> for FaultSummary {
    fn from(record: &FaultRecord) -> Self {
        FaultSummary {
            name: record.name.clone(),
            message: record.message.clone(),
            stack: record.stack_trace.clone(),
        }
    }
}

impl From<&Fault> for FaultSummary {
    fn from(fault: &Fault) -> Self {
        FaultSummary {
            name: fault.name.clone(),
            message: fault.message.clone(),
            stack: fault.stack.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_markers_classify_as_network_like() {
        assert_eq!(Fault::new("fetch failed: timeout").kind(), FaultKind::NetworkLike);
        assert_eq!(Fault::new("network unreachable").kind(), FaultKind::NetworkLike);
        assert_eq!(Fault::new("request timeout after 30s").kind(), FaultKind::NetworkLike);
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(Fault::new("Fetch failed").kind(), FaultKind::Unrecoverable);
        assert_eq!(Fault::new("NETWORK DOWN").kind(), FaultKind::Unrecoverable);
    }

    #[test]
    fn declared_network_error_name_wins() {
        assert_eq!(Fault::network("connection refused").kind(), FaultKind::NetworkLike);
    }

    #[test]
    fn other_faults_are_unrecoverable() {
        assert_eq!(
            Fault::new("cannot read property 'title' of undefined").kind(),
            FaultKind::Unrecoverable
        );
    }

    #[test]
    fn panic_payloads_become_messages() {
        let fault = Fault::from_panic(Box::new("index out of bounds"));
        assert_eq!(fault.name, "Panic");
        assert_eq!(fault.message, "index out of bounds");

        let fault = Fault::from_panic(Box::new(String::from("owned message")));
        assert_eq!(fault.message, "owned message");

        let fault = Fault::from_panic(Box::new(17u8));
        assert!(fault.message.contains("non-string"));
    }

    #[test]
    fn record_keeps_classification_and_stack() {
        let record = FaultRecord::capture(Fault::network("socket closed").with_stack("at load()"));
        assert_eq!(record.kind, FaultKind::NetworkLike);
        assert_eq!(record.stack_trace.as_deref(), Some("at load()"));

        let summary = FaultSummary::from(&record);
        assert_eq!(summary.name, NETWORK_ERROR_NAME);
        assert_eq!(summary.stack.as_deref(), Some("at load()"));
    }
}

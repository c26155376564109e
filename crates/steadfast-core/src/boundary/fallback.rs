//! Default fallback screen shown in place of a faulted subtree.

use std::fmt;

use serde::Serialize;

use super::fault::{FaultKind, FaultRecord};

const TITLE: &str = "Something went wrong";

/// Action a host can offer on the fallback screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    Retry,
    GoHome,
}

impl FallbackAction {
    pub fn label(self) -> &'static str {
        match self {
            FallbackAction::Retry => "Try Again",
            FallbackAction::GoHome => "Go Home",
        }
    }
}

/// Collapsible detail panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultDetails {
    pub message: String,
    pub stack: Option<String>,
}

/// "Retry attempt: current/max"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptCounter {
    pub current: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackScreen {
    pub title: String,
    pub summary: String,
    pub details: Option<FaultDetails>,
    pub actions: Vec<FallbackAction>,
    pub attempt: Option<AttemptCounter>,
}

impl FallbackScreen {
    pub(crate) fn build(fault: Option<&FaultRecord>, retry_count: u32, max_retries: u32) -> Self {
        let summary = match fault.map(|f| f.kind) {
            Some(FaultKind::NetworkLike) => {
                "We could not reach the server. We will keep trying for a little while."
            }
            _ => "We encountered an unexpected error. Don't worry, we're working to fix it.",
        };

        FallbackScreen {
            title: TITLE.to_string(),
            summary: summary.to_string(),
            details: fault.map(|f| FaultDetails {
                message: f.message.clone(),
                stack: f.stack_trace.clone(),
            }),
            actions: vec![FallbackAction::Retry, FallbackAction::GoHome],
            attempt: (retry_count > 0).then_some(AttemptCounter {
                current: retry_count,
                max: max_retries,
            }),
        }
    }
}

impl fmt::Display for FallbackScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.summary)?;
        if let Some(details) = &self.details {
            writeln!(f)?;
            writeln!(f, "Error Details")?;
            writeln!(f, "  {}", details.message)?;
            if let Some(stack) = &details.stack {
                for line in stack.lines() {
                    writeln!(f, "  {line}")?;
                }
            }
        }
        writeln!(f)?;
        let labels: Vec<String> = self
            .actions
            .iter()
            .map(|a| format!("[{}]", a.label()))
            .collect();
        write!(f, "{}", labels.join(" "))?;
        if let Some(attempt) = self.attempt {
            write!(f, "\nRetry attempt: {}/{}", attempt.current, attempt.max)?;
        }
        Ok(())
    }
}

/// Outcome of rendering through a boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered<V> {
    /// The protected subtree rendered normally
    Children(V),
    /// Caller-supplied fallback
    Fallback(V),
    /// Default fallback screen
    Faulted(FallbackScreen),
}

impl<V> Rendered<V> {
    pub fn is_children(&self) -> bool {
        matches!(self, Rendered::Children(_))
    }

    pub fn children(self) -> Option<V> {
        match self {
            Rendered::Children(v) => Some(v),
            _ => None,
        }
    }
}

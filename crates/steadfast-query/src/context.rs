//! Execution context selection.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Selects how many client handles exist.
pub const ENV_EXECUTION_CONTEXT: &str = "STEADFAST_EXECUTION_CONTEXT";

/// Whether cache handles are per request or process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Server-style: a fresh handle per logical request, discarded after
    Ephemeral,
    /// Client-style: one lazily created handle for the whole process
    Persistent,
}

impl ExecutionContext {
    /// Read `STEADFAST_EXECUTION_CONTEXT`; defaults to persistent.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_EXECUTION_CONTEXT).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("persistent") => ExecutionContext::Persistent,
            Some("ephemeral") => ExecutionContext::Ephemeral,
            Some(other) => {
                warn!(value = other, "unknown execution context; using persistent");
                ExecutionContext::Persistent
            }
        }
    }
}

//! Boundary state and the bounded recovery policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fault::FaultRecord;

/// Whether the protected subtree is being rendered or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Healthy,
    Faulted,
}

/// Snapshot of a boundary.
///
/// `fault` is present exactly when `phase` is [`Phase::Faulted`].
/// `retry_count` counts automatic recoveries since the last manual retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryState {
    pub phase: Phase,
    pub fault: Option<FaultRecord>,
    pub retry_count: u32,
}

impl Default for BoundaryState {
    fn default() -> Self {
        Self::healthy()
    }
}

impl BoundaryState {
    pub fn healthy() -> Self {
        BoundaryState {
            phase: Phase::Healthy,
            fault: None,
            retry_count: 0,
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.phase == Phase::Faulted
    }
}

/// Bounded exponential recovery policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RecoveryPolicy {
    /// `min(base * 2^retry_count, max)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether another automatic recovery may be scheduled.
    pub fn allows(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

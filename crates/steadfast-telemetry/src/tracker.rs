//! Elapsed-time measurement reported as a performance metric.

use std::time::Duration;

use tokio::time::Instant;

use crate::dispatcher::Dispatcher;
use crate::report::Properties;

/// Measures one named operation from creation until [`finish`](Self::finish).
pub struct PerformanceTracker<'a> {
    dispatcher: &'a Dispatcher,
    name: String,
    started: Instant,
}

impl<'a> PerformanceTracker<'a> {
    pub(crate) fn start(dispatcher: &'a Dispatcher, name: &str) -> Self {
        Self {
            dispatcher,
            name: name.to_string(),
            started: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report the elapsed time in milliseconds and return it.
    pub fn finish(self, metadata: Option<Properties>) -> Duration {
        let elapsed = self.started.elapsed();
        let millis = elapsed.as_secs_f64() * 1_000.0;
        let _dispatch = self
            .dispatcher
            .report_performance_metric(&self.name, millis, metadata);
        elapsed
    }
}

impl Dispatcher {
    /// Start measuring `name`.
    pub fn tracker(&self, name: &str) -> PerformanceTracker<'_> {
        PerformanceTracker::start(self, name)
    }
}

//! Dispatcher configuration
//!
//! Read once from the environment when the dispatcher is constructed and
//! immutable afterwards.

use serde::{Deserialize, Serialize};

/// Environment variable selecting production mode (`production` transmits reports).
pub const ENV_MODE: &str = "STEADFAST_ENV";
/// Set to `true` to enable analytics events.
pub const ENV_ANALYTICS: &str = "STEADFAST_ENABLE_ANALYTICS";
/// Set to `true` to enable error reports.
pub const ENV_ERROR_REPORTING: &str = "STEADFAST_ENABLE_ERROR_REPORTING";
/// Set to `true` to enable performance metrics.
pub const ENV_PERFORMANCE: &str = "STEADFAST_ENABLE_PERFORMANCE_MONITORING";
/// Base URL of the collector.
pub const ENV_COLLECTOR_URL: &str = "STEADFAST_COLLECTOR_URL";

/// Collector used when `STEADFAST_COLLECTOR_URL` is unset.
pub const DEFAULT_COLLECTOR_URL: &str = "http://localhost:3000/api/monitoring";

/// Whether reports are transmitted or only logged locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    NonProduction,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("production") => Environment::Production,
            _ => Environment::NonProduction,
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Production transmits; anything else logs locally
    pub environment: Environment,
    /// Gate for `track_event`
    pub analytics_enabled: bool,
    /// Gate for `report_error`
    pub error_reporting_enabled: bool,
    /// Gate for `report_performance_metric` and `report_web_vital`
    pub performance_monitoring_enabled: bool,
    /// Collector base URL; endpoints are appended to it
    pub collector_url: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            environment: Environment::NonProduction,
            analytics_enabled: false,
            error_reporting_enabled: false,
            performance_monitoring_enabled: false,
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Create a config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create a config from an arbitrary key lookup.
    ///
    /// Toggles are enabled only by the exact string `true`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).as_deref() == Some("true");

        DispatcherConfig {
            environment: Environment::parse(lookup(ENV_MODE).as_deref()),
            analytics_enabled: flag(ENV_ANALYTICS),
            error_reporting_enabled: flag(ENV_ERROR_REPORTING),
            performance_monitoring_enabled: flag(ENV_PERFORMANCE),
            collector_url: lookup(ENV_COLLECTOR_URL)
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COLLECTOR_URL.to_string()),
        }
    }

    /// Every category enabled, transmitting to `collector_url`
    pub fn production(collector_url: &str) -> Self {
        DispatcherConfig {
            environment: Environment::Production,
            analytics_enabled: true,
            error_reporting_enabled: true,
            performance_monitoring_enabled: true,
            collector_url: collector_url.to_string(),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_analytics(mut self, enabled: bool) -> Self {
        self.analytics_enabled = enabled;
        self
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.error_reporting_enabled = enabled;
        self
    }

    pub fn with_performance_monitoring(mut self, enabled: bool) -> Self {
        self.performance_monitoring_enabled = enabled;
        self
    }
}

//! Collector sinks
//!
//! A [`CollectorSink`] accepts one report per call. The dispatcher never
//! retries a failed delivery, so sinks should fail fast.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, TelemetryError};
use crate::report::Report;

/// Destination for reports.
#[async_trait]
pub trait CollectorSink: Send + Sync {
    /// Deliver a single report.
    async fn deliver(&self, report: &Report) -> Result<()>;
}

/// Posts each report as JSON to `{base_url}/{endpoint}`.
pub struct HttpCollector {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpCollector {
    /// Per-request timeout; telemetry must not linger.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a collector client for `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TelemetryError::InvalidConfig(format!(
                "collector url must be http(s): {base_url}"
            )));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("steadfast-telemetry/", env!("CARGO_PKG_VERSION")))
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?;

        Ok(HttpCollector {
            base_url,
            http_client,
        })
    }

    /// Full endpoint URL for a report
    pub fn endpoint_for(&self, report: &Report) -> String {
        format!("{}/{}", self.base_url, report.kind().endpoint())
    }
}

#[async_trait]
impl CollectorSink for HttpCollector {
    async fn deliver(&self, report: &Report) -> Result<()> {
        let url = self.endpoint_for(report);
        let response = self.http_client.post(&url).json(report).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(url = %url, report_id = %report.id(), "report delivered");
        Ok(())
    }
}

/// Stand-in used when the configured collector cannot be built.
pub(crate) struct UnconfiguredSink {
    reason: String,
}

impl UnconfiguredSink {
    pub(crate) fn new(reason: String) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl CollectorSink for UnconfiguredSink {
    async fn deliver(&self, _report: &Report) -> Result<()> {
        Err(TelemetryError::Unavailable(self.reason.clone()))
    }
}

//! Log output for the `steadfast` binary.
//!
//! Boundary lifecycle events (`boundary.*`), locally logged telemetry
//! records (`telemetry.*`) and cache retries are all `tracing` events; this
//! module installs the subscriber that prints them.

use std::env;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter variable checked before `RUST_LOG`.
pub const ENV_LOG: &str = "STEADFAST_LOG";

/// Pick the filter directives: `STEADFAST_LOG`, then `RUST_LOG`, then `level`.
/// Blank variables are skipped.
pub fn filter_directives(
    steadfast_log: Option<&str>,
    rust_log: Option<&str>,
    level: Level,
) -> String {
    [steadfast_log, rust_log]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|directives| !directives.is_empty())
        .map_or_else(|| level.as_str().to_lowercase(), str::to_string)
}

/// Install the global subscriber, JSON lines when `json` is set.
///
/// Unparseable directives fall back to `level`. Only the first call in a
/// process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let directives = filter_directives(
        env::var(ENV_LOG).ok().as_deref(),
        env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        level,
    );
    let env_filter =
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let output = fmt::layer().with_target(false);
    let output = if json {
        output.json().boxed()
    } else {
        output.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(output)
        .try_init()
        .ok();
}

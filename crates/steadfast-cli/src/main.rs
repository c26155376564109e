//! Steadfast CLI
//!
//! ## Commands
//!
//! - `probe`: fetch a URL through the request cache, inside a fault boundary
//! - `event`: send an analytics event through the telemetry dispatcher
//! - `config`: show the configuration read from the environment

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use steadfast_core::{Fault, FaultBoundary, Rendered, METRICS};
use steadfast_query::{ExecutionContext, QueryClient, QueryError, QueryFailure, QueryKey};
use steadfast_telemetry::{Dispatch, Dispatcher, Properties};
use tracing::{debug, info, Level};

/// Per-request timeout for `probe`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "steadfast")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fault isolation, telemetry and cached requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL through the request cache inside a fault boundary
    Probe {
        /// URL to fetch
        url: String,

        /// Keep waiting while an automatic recovery is scheduled
        #[arg(short, long)]
        follow: bool,
    },

    /// Send an analytics event
    Event {
        /// Event name
        name: String,

        /// Event property as key=value (repeatable); values are parsed as JSON when possible
        #[arg(short, long = "prop", value_parser = parse_prop)]
        props: Vec<(String, Value)>,
    },

    /// Show the configuration read from the environment
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    steadfast_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Probe { url, follow } => cmd_probe(&url, follow).await,
        Commands::Event { name, props } => cmd_event(&name, props).await,
        Commands::Config => cmd_config(),
    };

    if cli.verbose {
        METRICS.flush();
        Dispatcher::global().stats().flush();
    }
    result
}

/// Fetch `url` and print its body, or the fallback screen when it fails.
async fn cmd_probe(url: &str, follow: bool) -> Result<()> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("steadfast/", env!("CARGO_PKG_VERSION")))
        .timeout(PROBE_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let client = QueryClient::acquire(ExecutionContext::from_env());
    let boundary: FaultBoundary<String> = FaultBoundary::builder()
        .name("probe")
        .on_go_home(|| info!("nothing to navigate to from the command line"))
        .build();
    let mut changes = boundary.subscribe();

    loop {
        let fetch_http = http.clone();
        let fetch_url = url.to_string();
        let result = client
            .get_or_fetch(QueryKey::from(["probe", url]), move || {
                let http = fetch_http.clone();
                let url = fetch_url.clone();
                async move { fetch_text(&http, &url).await }
            })
            .await;

        let rendered = boundary.render(|| result.map_err(|failure| fault_from_failure(&failure)));
        match rendered {
            Rendered::Children(body) | Rendered::Fallback(body) => {
                println!("{body}");
                return Ok(());
            }
            Rendered::Faulted(screen) => {
                println!("{screen}");
                if !(follow && boundary.recovery_pending()) {
                    bail!("{url} could not be loaded");
                }
            }
        }

        changes.borrow_and_update();
        changes
            .changed()
            .await
            .context("Boundary closed while waiting for recovery")?;
        debug!(retry_count = changes.borrow().retry_count, "boundary recovered; fetching again");
    }
}

async fn fetch_text(http: &reqwest::Client, url: &str) -> Result<String, QueryError> {
    let response = http.get(url).send().await.map_err(to_query_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(QueryError::http(
            status.as_u16(),
            status.canonical_reason().unwrap_or("request failed"),
        ));
    }

    response.text().await.map_err(to_query_error)
}

fn to_query_error(err: reqwest::Error) -> QueryError {
    if err.is_timeout() {
        QueryError::Timeout
    } else if let Some(status) = err.status() {
        QueryError::http(status.as_u16(), err.to_string())
    } else {
        QueryError::Network(err.to_string())
    }
}

/// Transport failures are tagged as network faults so the boundary retries them.
fn fault_from_failure(failure: &QueryFailure) -> Fault {
    match failure.error {
        QueryError::Network(_) | QueryError::Timeout => Fault::network(failure.to_string()),
        _ => Fault::from_error(failure),
    }
}

async fn cmd_event(name: &str, props: Vec<(String, Value)>) -> Result<()> {
    let properties: Properties = props.into_iter().collect();
    let properties = (!properties.is_empty()).then_some(properties);

    let dispatcher = Dispatcher::global();
    match dispatcher.track_event(name, properties) {
        Dispatch::Disabled => {
            println!("Analytics are disabled (set STEADFAST_ENABLE_ANALYTICS=true)");
        }
        Dispatch::Logged => println!("Event '{name}' logged locally (non-production)"),
        Dispatch::Dropped => bail!("Event '{name}' could not be scheduled"),
        spawned @ Dispatch::Spawned(_) => {
            spawned.settled().await;
            if dispatcher.stats().failed() > 0 {
                bail!("Event '{name}' was not accepted by the collector");
            }
            println!("Event '{name}' sent to {}", dispatcher.config().collector_url);
        }
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let dispatcher = Dispatcher::global();
    let output = json!({
        "telemetry": dispatcher.config(),
        "executionContext": ExecutionContext::from_env(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_prop(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

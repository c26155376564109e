//! Steadfast Query: request cache client with staleness and retry policies
//!
//! [`QueryClient`] caches fetch results per [`QueryKey`] and decides, from its
//! [`CachePolicy`], whether a result is served, refreshed in the background,
//! or fetched again. Failed fetches and mutations are retried with
//! exponential backoff; 404 and 401 responses are never retried.
//!
//! ## Execution contexts
//!
//! - `Ephemeral`: one handle per logical request, nothing shared
//! - `Persistent`: one process-wide handle, created on first use

pub mod client;
pub mod context;
pub mod error;
pub mod key;
pub mod policy;
pub mod retry;

pub use client::{QueryClient, QueryStatus};
pub use context::ExecutionContext;
pub use error::{ErrorClass, QueryError, QueryFailure};
pub use key::QueryKey;
pub use policy::{exponential_delay, CachePolicy, RetryPolicy};
pub use retry::run_with_retry;

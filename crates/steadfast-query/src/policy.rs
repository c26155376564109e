//! Retry and staleness policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrorClass, QueryError};

/// First retry waits this long; each further retry doubles it.
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(1_000);
/// Upper bound on any single retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Default read retries.
pub const DEFAULT_QUERY_RETRIES: u32 = 3;
/// Default write retries; writes may have side effects.
pub const DEFAULT_MUTATION_RETRIES: u32 = 2;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_EVICT_AFTER: Duration = Duration::from_secs(30 * 60);

pub type RetryPredicate = Arc<dyn Fn(&QueryError) -> bool + Send + Sync>;
pub type RetryDelay = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// `min(1000ms * 2^attempt, 30000ms)`
pub fn exponential_delay(attempt: u32) -> Duration {
    let shift = attempt.min(20);
    let calculated = (BASE_RETRY_DELAY.as_millis() as u64).saturating_mul(1_u64 << shift);
    Duration::from_millis(calculated.min(MAX_RETRY_DELAY.as_millis() as u64))
}

/// Everything except 404/401 is worth another try.
pub fn retry_transient(error: &QueryError) -> bool {
    error.class() == ErrorClass::Transient
}

/// How a failed request is retried.
///
/// `max_attempts` counts retries after the initial call, so a request is
/// invoked at most `max_attempts + 1` times. Retry `n` (starting at 0)
/// waits `delay_for_attempt(n)` first.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    is_retryable: RetryPredicate,
    delay_for_attempt: RetryDelay,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            is_retryable: Arc::new(retry_transient),
            delay_for_attempt: Arc::new(exponential_delay),
        }
    }

    /// Read policy: 3 retries.
    pub fn queries() -> Self {
        Self::new(DEFAULT_QUERY_RETRIES)
    }

    /// Write policy: 2 retries.
    pub fn mutations() -> Self {
        Self::new(DEFAULT_MUTATION_RETRIES)
    }

    /// Never retry.
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&QueryError) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(predicate);
        self
    }

    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.delay_for_attempt = Arc::new(delay);
        self
    }

    pub fn is_retryable(&self, error: &QueryError) -> bool {
        (self.is_retryable)(error)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        (self.delay_for_attempt)(attempt)
    }

    /// Whether a request that has already been retried `retries` times
    /// should be retried again after failing with `error`.
    pub fn should_retry(&self, retries: u32, error: &QueryError) -> bool {
        retries < self.max_attempts && self.is_retryable(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::queries()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Staleness, eviction and retry configuration for one client.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Younger results are served without refetching
    pub stale_after: Duration,
    /// Older results are discarded and fetched in the foreground
    pub evict_after: Duration,
    pub query_retry: RetryPolicy,
    pub mutation_retry: RetryPolicy,
    /// Regaining focus does not invalidate; only reconnecting does
    pub refetch_on_reconnect_only: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            stale_after: DEFAULT_STALE_AFTER,
            evict_after: DEFAULT_EVICT_AFTER,
            query_retry: RetryPolicy::queries(),
            mutation_retry: RetryPolicy::mutations(),
            refetch_on_reconnect_only: true,
        }
    }
}

impl CachePolicy {
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_evict_after(mut self, evict_after: Duration) -> Self {
        self.evict_after = evict_after;
        self
    }

    pub fn with_query_retry(mut self, policy: RetryPolicy) -> Self {
        self.query_retry = policy;
        self
    }

    pub fn with_mutation_retry(mut self, policy: RetryPolicy) -> Self {
        self.mutation_retry = policy;
        self
    }

    pub fn with_refetch_on_reconnect_only(mut self, enabled: bool) -> Self {
        self.refetch_on_reconnect_only = enabled;
        self
    }
}

//! Sequential retry loop shared by reads and writes.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::{QueryError, QueryFailure};
use crate::policy::RetryPolicy;

/// Run `op` until it succeeds or `policy` gives up.
///
/// Attempts are strictly sequential: retry `n + 1` starts only after
/// attempt `n` has failed and its delay has elapsed.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    op: F,
) -> Result<T, QueryFailure>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, QueryError>>,
{
    let mut retries = 0u32;
    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let attempts = retries + 1;

        if !policy.should_retry(retries, &error) {
            warn!(
                request = %label,
                attempts,
                retryable = policy.is_retryable(&error),
                error = %error,
                "request failed"
            );
            return Err(QueryFailure { attempts, error });
        }

        let delay = policy.delay_for_attempt(retries);
        debug!(
            request = %label,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying request"
        );
        tokio::time::sleep(delay).await;
        retries += 1;
    }
}

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::ScrapeError;

/// Retry policy for storefront fetches: transport failures and the
/// rate-limit body heuristic get the same exponential-backoff treatment.
///
/// Exhausting the attempts degrades to "no data" — the policy returns
/// `None` and the caller treats it like an empty page. It never raises.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts (not re-tries after the first).
    pub retries: u32,
    /// Delay before the second attempt; doubles each attempt after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries: retries.max(1),
            base_delay,
        }
    }

    /// Wait time before attempt `i + 1`: base, 2×base, 4×base, …
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Run `op` up to `retries` times with exponential backoff between
    /// attempts. Returns the first success, or `None` once attempts are
    /// exhausted.
    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> Option<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ScrapeError>>,
    {
        for attempt in 0..self.retries {
            match op().await {
                Ok(value) => return Some(value),
                Err(e) if attempt + 1 < self.retries => {
                    let wait = self.backoff(attempt);
                    warn!(
                        what,
                        error = %e,
                        attempt = attempt + 1,
                        retries = self.retries,
                        wait_ms = wait.as_millis() as u64,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    error!(what, error = %e, retries = self.retries, "request failed, giving up");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn failing_op_is_invoked_exactly_retries_times_then_yields_none() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Option<()> = policy
            .run("test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ScrapeError::RateLimited) }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = policy
            .run("test", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(ScrapeError::Status(503))
                    } else {
                        Ok("body")
                    }
                }
            })
            .await;

        assert_eq!(result, Some("body"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run("test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result, Some(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
    }
}

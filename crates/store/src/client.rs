use std::time::Duration;

use tracing::debug;

use crate::error::ScrapeError;
use crate::retry::RetryPolicy;

/// Body marker Crystal Commerce pages use to signal rate limiting on an
/// otherwise successful (200) response.
const RATE_LIMIT_MARKER: &str = "too many searches";

/// Pooled HTTP client shared by all storefront scrapers.
///
/// One `reqwest::Client` (connection pool) plus the retry policy; every
/// page fetch goes through [`HttpFetcher::fetch`], so backoff and the
/// rate-limit heuristic apply uniformly instead of per-call loops.
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("cardwatch/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client, policy })
    }

    /// Fetch a page body, retrying per the policy. Returns `None` when
    /// attempts are exhausted — callers treat that as "no data".
    pub async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Option<String> {
        self.policy
            .run(url, || async {
                let response = self.client.get(url).query(params).send().await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ScrapeError::Status(status.as_u16()));
                }

                let body = response.text().await?;
                if is_rate_limited(&body) {
                    return Err(ScrapeError::RateLimited);
                }

                debug!(url, bytes = body.len(), "fetched page");
                Ok(body)
            })
            .await
    }
}

/// Detect the application-level rate-limit signal hidden in a 200 body.
pub fn is_rate_limited(body: &str) -> bool {
    body.contains(RATE_LIMIT_MARKER)
}

//! Backoff policy consulted between fetch attempts

use crate::config::RetryConfig;
use crate::crawler::fetcher::{DirectFetcher, FailureClass, FetchError, FetchedPage};
use crate::url::{host_of, HostPattern};
use crate::ConfigResult;
use std::time::Duration;
use url::Url;

/// How many times to try a page and how long to wait between tries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    strict_attempts: u32,
    strict_hosts: Vec<HostPattern>,
    backoff: Duration,
    rate_limit_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> ConfigResult<Self> {
        let strict_hosts = config
            .strict_hosts
            .iter()
            .map(|p| HostPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            attempts: config.attempts.max(1),
            strict_attempts: config.strict_attempts.max(config.attempts).max(1),
            strict_hosts,
            backoff: Duration::from_millis(config.backoff_ms),
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
        })
    }

    /// Total attempts allowed for a page on `host`
    pub fn attempts_for(&self, host: &str) -> u32 {
        if self.strict_hosts.iter().any(|p| p.matches(host)) {
            self.strict_attempts
        } else {
            self.attempts
        }
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    ///
    /// Linear in the attempt number; a 429 uses the longer rate-limit base.
    pub fn delay_after(&self, error: &FetchError, attempt: u32) -> Duration {
        let base = match error.class() {
            FailureClass::RateLimited => self.rate_limit_backoff,
            FailureClass::Timeout | FailureClass::Other => self.backoff,
        };
        base * attempt.max(1)
    }

    /// Fetches a URL, retrying until it succeeds or the host's attempts run out
    ///
    /// Oversized pages are never retried. Only the final failure is returned;
    /// intermediate ones are logged.
    pub async fn fetch(&self, fetcher: &DirectFetcher, url: &str) -> Result<FetchedPage, FetchError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| host_of(&u))
            .unwrap_or_default();
        let attempts = self.attempts_for(&host);

        let mut attempt = 1;
        loop {
            match fetcher.fetch(url).await {
                Ok(page) => return Ok(page),
                Err(error) if !error.is_retryable() || attempt >= attempts => return Err(error),
                Err(error) => {
                    let delay = self.delay_after(&error, attempt);
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        attempts,
                        url,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

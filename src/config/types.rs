use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Kumo-Crawl
///
/// Every section is optional in the TOML file; missing sections and keys fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub service: ServiceConfig,
}

/// Crawl run limits and fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Page budget used when a request does not name one
    pub default_max_pages: u32,

    /// Largest page budget a request may ask for
    pub max_pages_cap: u32,

    /// Wall-clock deadline for a single run (milliseconds)
    pub max_crawl_duration_ms: u64,

    /// Share of the page budget that may fail before a run stops early
    pub error_budget_ratio: f64,

    /// Absolute ceiling on the error budget
    pub error_budget_cap: u32,

    /// Network timeout for one fetch (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Connect timeout for one fetch (milliseconds)
    pub connect_timeout_ms: u64,

    /// Response bodies larger than this are discarded
    pub max_response_bytes: u64,

    /// Redirect hops followed by the direct fetcher
    pub max_redirects: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            default_max_pages: 10,
            max_pages_cap: 500,
            max_crawl_duration_ms: 5 * 60 * 1000,
            error_budget_ratio: 0.3,
            error_budget_cap: 100,
            fetch_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_response_bytes: 2 * 1024 * 1024,
            max_redirects: 5,
        }
    }
}

impl CrawlerConfig {
    pub fn max_crawl_duration(&self) -> Duration {
        Duration::from_millis(self.max_crawl_duration_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Computes the error budget for a run with the given page budget
    ///
    /// `min(ceil(ratio * pages), cap)`, never below one so that a run with a
    /// tiny page budget can still absorb a single failure.
    pub fn error_budget(&self, page_budget: u32) -> u32 {
        // 100 * 0.3 is 30.000000000000004 in f64
        let scaled = (f64::from(page_budget) * self.error_budget_ratio - 1e-9).ceil() as u32;
        scaled.min(self.error_budget_cap).max(1)
    }
}

/// Per-page retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Fetch attempts per page for ordinary hosts
    pub attempts: u32,

    /// Fetch attempts per page for hosts on the strict list
    pub strict_attempts: u32,

    /// Host patterns (e.g. "*.linkedin.com") that get `strict_attempts`
    pub strict_hosts: Vec<String>,

    /// Base delay after a generic failure (milliseconds)
    pub backoff_ms: u64,

    /// Base delay after an HTTP 429 response (milliseconds)
    pub rate_limit_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 2,
            strict_attempts: 3,
            strict_hosts: [
                "*.linkedin.com",
                "*.facebook.com",
                "*.instagram.com",
                "*.twitter.com",
                "*.x.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            backoff_ms: 1000,
            rate_limit_backoff_ms: 5000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "KumoCrawl".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Request-level service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Crawl runs allowed to execute at the same time
    pub max_active_runs: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_active_runs: 50,
        }
    }
}

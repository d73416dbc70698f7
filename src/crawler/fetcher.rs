//! Direct-HTTP fetch strategy
//!
//! This module handles single-URL HTTP requests for the crawler, including:
//! - Building the HTTP client with the fixed user agent and header set
//! - Following a bounded number of redirects
//! - Enforcing the response size cap while streaming the body
//! - Classifying failures into timeouts, HTTP errors and network errors

use crate::config::Config;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("response larger than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("HTTP {0}")]
    Http(u16),

    #[error("network error: {0}")]
    Network(String),
}

/// Coarse failure classes used to pick a retry delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    RateLimited,
    Other,
}

impl FetchError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout => FailureClass::Timeout,
            Self::Http(429) => FailureClass::RateLimited,
            _ => FailureClass::Other,
        }
    }

    /// Oversized pages are skipped outright; everything else may succeed later
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::TooLarge { .. })
    }
}

/// A page returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    /// Response headers, lowercase names
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Builds an HTTP client with the crawler's fixed identity
///
/// Format of the user agent: `CrawlerName/Version (+ContactURL)`.
///
/// # Example
///
/// ```
/// use kumo_crawl::config::Config;
/// use kumo_crawl::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default());
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .default_headers(headers)
        .timeout(config.crawler.fetch_timeout())
        .connect_timeout(config.crawler.connect_timeout())
        .redirect(Policy::limited(config.crawler.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one URL per call
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
}

impl DirectFetcher {
    pub fn new(client: Client, timeout: Duration, max_bytes: u64) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    /// Builds a fetcher and its client from configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(config)?,
            config.crawler.fetch_timeout(),
            config.crawler.max_response_bytes,
        ))
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fetches a URL
    ///
    /// # Failure Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Network timeout | `Timeout` |
    /// | Non-2xx status (after redirects) | `Http(status)` |
    /// | Content-Length or streamed body over the cap | `TooLarge` |
    /// | Anything else (DNS, TLS, refused, redirect limit) | `Network` |
    ///
    /// The body read is aborted as soon as it passes the size cap.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status().filter(StatusCode::is_client_error) {
        FetchError::Http(status.as_u16())
    } else {
        FetchError::Network(error.to_string())
    }
}

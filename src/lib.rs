//! Kumo-Crawl: a bounded site crawler
//!
//! This crate implements a crawl orchestrator that, given a seed URL and a page
//! budget, discovers and fetches a bounded set of pages. Runs are deduplicated,
//! retried per page, capped by an error budget and a wall-clock deadline, and
//! fall back from a native crawling engine to plain HTTP fetches when needed.

pub mod config;
pub mod crawler;
pub mod detect;
pub mod gate;
pub mod output;
pub mod service;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Kumo-Crawl operations
#[derive(Debug, Error)]
pub enum KumoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid crawl request: {0}")]
    Request(#[from] RequestError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid run phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunPhase,
        to: state::RunPhase,
    },

    #[error("Concurrency gate closed")]
    GateClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },
}

/// Crawl request validation errors
///
/// These are rejected before any run starts and carry a stable wire code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("URL is required")]
    MissingUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid mode '{0}', expected 'single' or 'multipage'")]
    InvalidMode(String),

    #[error("maxPages must be between 1 and {cap}, got {requested}")]
    PageLimitExceeded { requested: i64, cap: u32 },
}

impl RequestError {
    /// Returns the wire code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingUrl => "MISSING_URL",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::InvalidMode(_) => "INVALID_MODE",
            Self::PageLimitExceeded { .. } => "PAGE_LIMIT_EXCEEDED",
        }
    }
}

/// Result type alias for Kumo-Crawl operations
pub type Result<T> = std::result::Result<T, KumoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlMode, CrawlRequest, Coordinator, FeatureFlags};
pub use gate::ConcurrencyGate;
pub use service::{CrawlService, RequestBody, ServiceReply};
pub use state::{CrawlRun, PageResult, RunPhase, StopReason};
pub use url::{normalize, normalize_relative};

//! Configuration module for Kumo-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus a small set of environment overrides for deployment tuning.
//!
//! # Example
//!
//! ```no_run
//! use kumo_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("kumo.toml")).unwrap();
//! println!("Run deadline: {:?}", config.crawler.max_crawl_duration());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, RetryConfig, ServiceConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, apply_overrides_from, compute_config_hash, default_config, load_config,
    load_config_with_hash, ENV_DEFAULT_MAX_PAGES, ENV_MAX_ACTIVE_RUNS, ENV_MAX_CRAWL_DURATION_MS,
};
pub use validation::{validate, ABSOLUTE_PAGE_CAP};

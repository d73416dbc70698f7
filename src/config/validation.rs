use crate::config::types::{Config, CrawlerConfig, RetryConfig, ServiceConfig, UserAgentConfig};
use crate::url::HostPattern;
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Hard ceiling for `max-pages-cap`
pub const ABSOLUTE_PAGE_CAP: u32 = 500;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_service_config(&config.service)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.max_pages_cap < 1 || config.max_pages_cap > ABSOLUTE_PAGE_CAP {
        return Err(ConfigError::Validation(format!(
            "max_pages_cap must be between 1 and {}, got {}",
            ABSOLUTE_PAGE_CAP, config.max_pages_cap
        )));
    }

    if config.default_max_pages < 1 || config.default_max_pages > config.max_pages_cap {
        return Err(ConfigError::Validation(format!(
            "default_max_pages must be between 1 and {}, got {}",
            config.max_pages_cap, config.default_max_pages
        )));
    }

    if config.max_crawl_duration_ms == 0 {
        return Err(ConfigError::Validation(
            "max_crawl_duration_ms must be positive".to_string(),
        ));
    }

    if !(config.error_budget_ratio > 0.0 && config.error_budget_ratio <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "error_budget_ratio must be in (0, 1], got {}",
            config.error_budget_ratio
        )));
    }

    if config.error_budget_cap < 1 {
        return Err(ConfigError::Validation(
            "error_budget_cap must be >= 1".to_string(),
        ));
    }

    if config.fetch_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_ms must be >= 100ms, got {}ms",
            config.fetch_timeout_ms
        )));
    }

    if config.max_response_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_response_bytes must be >= 1024, got {}",
            config.max_response_bytes
        )));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> ConfigResult<()> {
    if config.attempts < 1 || config.attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "retry attempts must be between 1 and 10, got {}",
            config.attempts
        )));
    }

    if config.strict_attempts < config.attempts || config.strict_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "strict_attempts must be between {} and 10, got {}",
            config.attempts, config.strict_attempts
        )));
    }

    for pattern in &config.strict_hosts {
        HostPattern::parse(pattern)?;
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

fn validate_service_config(config: &ServiceConfig) -> ConfigResult<()> {
    if config.max_active_runs < 1 || config.max_active_runs > 10_000 {
        return Err(ConfigError::Validation(format!(
            "max_active_runs must be between 1 and 10000, got {}",
            config.max_active_runs
        )));
    }
    Ok(())
}

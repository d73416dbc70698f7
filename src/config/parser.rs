use crate::config::types::Config;
use crate::config::validation::validate;
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

/// Environment variable overriding `crawler.max-crawl-duration-ms`
pub const ENV_MAX_CRAWL_DURATION_MS: &str = "KUMO_MAX_CRAWL_DURATION_MS";

/// Environment variable overriding `crawler.default-max-pages`
pub const ENV_DEFAULT_MAX_PAGES: &str = "KUMO_DEFAULT_MAX_PAGES";

/// Environment variable overriding `service.max-active-runs`
pub const ENV_MAX_ACTIVE_RUNS: &str = "KUMO_MAX_ACTIVE_RUNS";

/// Loads, parses and validates a configuration file
///
/// Environment overrides are applied between parsing and validation, so an
/// override that breaks a limit is rejected like a bad file value would be.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use kumo_crawl::config::load_config;
///
/// let config = load_config(Path::new("kumo.toml")).unwrap();
/// println!("Page cap: {}", config.crawler.max_pages_cap);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Builds the default configuration with environment overrides applied
pub fn default_config() -> ConfigResult<Config> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Applies overrides from the process environment
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_overrides_from(config, |var| std::env::var(var).ok())
}

/// Applies overrides using the given variable lookup
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = parse_var(&lookup, ENV_MAX_CRAWL_DURATION_MS)? {
        config.crawler.max_crawl_duration_ms = ms;
    }
    if let Some(pages) = parse_var(&lookup, ENV_DEFAULT_MAX_PAGES)? {
        config.crawler.default_max_pages = pages;
    }
    if let Some(runs) = parse_var(&lookup, ENV_MAX_ACTIVE_RUNS)? {
        config.service.max_active_runs = runs;
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, var: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
    }
}

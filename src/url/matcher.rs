use crate::{ConfigError, ConfigResult};
use std::fmt;

/// A host pattern from configuration
///
/// - `example.com` matches only `example.com`
/// - `*.example.com` matches `example.com` and any subdomain of it
///
/// Matching ignores ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    Exact(String),
    Subdomains(String),
}

impl HostPattern {
    /// Parses and validates a pattern
    ///
    /// # Examples
    ///
    /// ```
    /// use kumo_crawl::url::HostPattern;
    ///
    /// let pattern = HostPattern::parse("*.linkedin.com").unwrap();
    /// assert!(pattern.matches("linkedin.com"));
    /// assert!(pattern.matches("www.LinkedIn.com"));
    /// assert!(!pattern.matches("notlinkedin.com"));
    /// ```
    pub fn parse(pattern: &str) -> ConfigResult<Self> {
        let pattern = pattern.trim().to_ascii_lowercase();
        match pattern.strip_prefix("*.") {
            Some(base) => {
                validate_host(base)?;
                Ok(Self::Subdomains(base.to_string()))
            }
            None => {
                validate_host(&pattern)?;
                Ok(Self::Exact(pattern))
            }
        }
    }

    /// Returns true if `host` is covered by this pattern
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        match self {
            Self::Exact(expected) => host == *expected,
            Self::Subdomains(base) => {
                host == *base
                    || (host.len() > base.len()
                        && host.ends_with(base.as_str())
                        && host.as_bytes()[host.len() - base.len() - 1] == b'.')
            }
        }
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(host) => f.write_str(host),
            Self::Subdomains(base) => write!(f, "*.{}", base),
        }
    }
}

fn validate_host(host: &str) -> ConfigResult<()> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with(['.', '-']) || host.ends_with(['.', '-']) || host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' is malformed",
            host
        )));
    }

    Ok(())
}

//! URL handling module for Kumo-Crawl
//!
//! This module provides URL normalization for dedup comparison and host
//! pattern matching for per-host retry rules.

mod matcher;
mod normalize;

use url::Url;

// Re-export main functions
pub use matcher::HostPattern;
pub use normalize::{canonicalize, normalize, normalize_relative, FragmentPolicy};

/// Returns the lowercase host of a URL, if it has one
pub fn host_of(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// Returns true for http and https URLs with a host
pub fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

/// Returns `url` with its fragment removed
pub fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

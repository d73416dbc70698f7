//! Crawl requests: seed, mode, page budget and feature flags

use crate::url::is_web_url;
use crate::RequestError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// How far a run may wander from its seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Fetch exactly the seed page
    #[default]
    Single,
    /// Follow internal links up to the page budget
    Multipage,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multipage => "multipage",
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlMode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multipage" => Ok(Self::Multipage),
            _ => Err(RequestError::InvalidMode(s.to_string())),
        }
    }
}

/// Per-run extraction and detection switches (all on by default)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub extract_links: bool,
    pub extract_images: bool,
    pub extract_meta: bool,
    pub detect_technologies: bool,
    pub detect_cms: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            extract_links: true,
            extract_images: true,
            extract_meta: true,
            detect_technologies: true,
            detect_cms: true,
        }
    }
}

/// A validated crawl request, immutable once a run starts
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    seed: Url,
    mode: CrawlMode,
    max_pages: u32,
    features: FeatureFlags,
}

impl CrawlRequest {
    /// Validates and builds a request
    ///
    /// # Arguments
    ///
    /// * `seed` - Absolute http(s) URL to start from
    /// * `mode` - Single page or multipage
    /// * `max_pages` - Page budget, must be within `1..=cap`
    /// * `cap` - Largest page budget the deployment allows
    /// * `features` - Extraction and detection switches
    pub fn new(
        seed: &str,
        mode: CrawlMode,
        max_pages: i64,
        cap: u32,
        features: FeatureFlags,
    ) -> Result<Self, RequestError> {
        let seed = parse_seed(seed)?;

        if max_pages < 1 || max_pages > i64::from(cap) {
            return Err(RequestError::PageLimitExceeded {
                requested: max_pages,
                cap,
            });
        }

        Ok(Self {
            seed,
            mode,
            max_pages: max_pages as u32,
            features,
        })
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn mode(&self) -> CrawlMode {
        self.mode
    }

    /// The page budget actually enforced: single mode never exceeds one page
    pub fn page_budget(&self) -> u32 {
        match self.mode {
            CrawlMode::Single => 1,
            CrawlMode::Multipage => self.max_pages,
        }
    }

    /// The page budget as requested
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }
}

fn parse_seed(raw: &str) -> Result<Url, RequestError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RequestError::MissingUrl);
    }

    let url = Url::parse(raw).map_err(|e| RequestError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !is_web_url(&url) {
        return Err(RequestError::InvalidUrl(format!(
            "{}: only http and https URLs can be crawled",
            raw
        )));
    }

    Ok(url)
}

//! Per-run records: page results and the sealed crawl run

use crate::crawler::{CrawlMode, ExtractedImage, ExtractedLink, FetchStrategy, MetaTag};
use crate::state::StopReason;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// One successfully fetched page
///
/// Created once per page and never modified afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub status: u16,
    pub title: String,
    pub content: String,
    pub links: Vec<ExtractedLink>,
    pub images: Vec<ExtractedImage>,
    pub meta_tags: Vec<MetaTag>,
    pub fetched_at: DateTime<Utc>,
}

/// Mutable bookkeeping owned by a single run's control loop
#[derive(Debug)]
pub(crate) struct RunLedger {
    pages: Vec<PageResult>,
    error_count: u32,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Facts about how a run ended, supplied when it is sealed
#[derive(Debug, Clone)]
pub(crate) struct RunOutcome {
    pub seed: String,
    pub mode: CrawlMode,
    pub stop_reason: StopReason,
    pub strategy: FetchStrategy,
    pub fell_back: bool,
    pub visited_count: usize,
    pub unvisited_remaining: usize,
}

impl RunLedger {
    pub(crate) fn start() -> Self {
        Self {
            pages: Vec::new(),
            error_count: 0,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub(crate) fn push_page(&mut self, page: PageResult) {
        self.pages.push(page);
    }

    pub(crate) fn record_error(&mut self) {
        self.error_count += 1;
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Finalizes aggregates and freezes the run
    pub(crate) fn seal(self, outcome: RunOutcome) -> CrawlRun {
        let links = dedup_by(self.pages.iter().flat_map(|p| &p.links), |l| l.href.clone());
        let images = dedup_by(self.pages.iter().flat_map(|p| &p.images), |i| i.src.clone());
        let meta_tags = dedup_by(self.pages.iter().flat_map(|p| &p.meta_tags), |m| {
            (m.name.clone(), m.content.clone())
        });

        CrawlRun {
            seed: outcome.seed,
            mode: outcome.mode,
            success_count: self.pages.len() as u32,
            pages: self.pages,
            links,
            images,
            meta_tags,
            error_count: self.error_count,
            visited_count: outcome.visited_count,
            unvisited_remaining: outcome.unvisited_remaining,
            stop_reason: outcome.stop_reason,
            strategy: outcome.strategy,
            fell_back: outcome.fell_back,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Keeps the first occurrence of each key, preserving discovery order
fn dedup_by<'a, T, K, F>(items: impl Iterator<Item = &'a T>, key: F) -> Vec<T>
where
    T: Clone + 'a,
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .filter(|item| seen.insert(key(item)))
        .cloned()
        .collect()
}

/// A finished, read-only crawl run
#[derive(Debug, Clone)]
pub struct CrawlRun {
    seed: String,
    mode: CrawlMode,
    pages: Vec<PageResult>,
    links: Vec<ExtractedLink>,
    images: Vec<ExtractedImage>,
    meta_tags: Vec<MetaTag>,
    success_count: u32,
    error_count: u32,
    visited_count: usize,
    unvisited_remaining: usize,
    stop_reason: StopReason,
    strategy: FetchStrategy,
    fell_back: bool,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    elapsed: Duration,
}

impl CrawlRun {
    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn mode(&self) -> CrawlMode {
        self.mode
    }

    /// Pages in the order they were fetched
    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    /// Links across all pages, deduplicated by href
    pub fn links(&self) -> &[ExtractedLink] {
        &self.links
    }

    /// Images across all pages, deduplicated by src
    pub fn images(&self) -> &[ExtractedImage] {
        &self.images
    }

    /// Meta tags across all pages, deduplicated by name and content
    pub fn meta_tags(&self) -> &[MetaTag] {
        &self.meta_tags
    }

    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Pages that failed every retry attempt
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// URLs the run attempted, successful or not
    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    /// Frontier entries discarded when the run stopped
    pub fn unvisited_remaining(&self) -> usize {
        self.unvisited_remaining
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    /// Strategy in effect when the run ended
    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    /// True if the native engine failed and the run finished on direct HTTP
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages.len() as f64 / secs
        } else {
            0.0
        }
    }
}

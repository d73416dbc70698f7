//! Native crawling engine strategy
//!
//! A native engine takes a seed and a page budget and produces a stream of page
//! events, discovering further pages on its own. The orchestrator treats it as
//! an opaque collaborator: it consumes events one at a time, applies its own
//! dedup and budgets, and abandons the engine for the rest of the run on the
//! first engine error.
//!
//! Engines should do no work ahead of demand: each pulled event may cost at
//! most one page (with its retries), so the orchestrator's budget checks run
//! before every fetch.

use crate::crawler::extract::discover_links;
use crate::crawler::fetcher::{DirectFetcher, FetchError, FetchedPage};
use crate::crawler::retry::RetryPolicy;
use crate::url::{host_of, normalize, without_fragment};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Which backend fetches pages for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Budgeted crawl through a [`NativeEngine`]
    Native,
    /// One URL per request through [`DirectFetcher`]
    Direct,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

/// The engine became unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine setup failed: {0}")]
    Setup(String),

    #[error("engine aborted: {0}")]
    Aborted(String),
}

/// One page outcome reported by an engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Page(FetchedPage),
    Failed { url: String, error: FetchError },
}

/// Stream of engine events; an `Err` item means the engine gave up
pub type EventStream = BoxStream<'static, Result<EngineEvent, EngineError>>;

/// A crawling backend that discovers and fetches pages by itself
pub trait NativeEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Starts crawling from `seed`, fetching at most `budget` pages
    fn crawl(&self, seed: &Url, budget: usize) -> Result<EventStream, EngineError>;
}

/// Built-in engine: a lazy, same-host breadth-first sweep
///
/// Each pulled event fetches one queued URL through the retry policy, then
/// queues the same-host links that page contains. Nothing is fetched until the
/// consumer asks for the next event.
#[derive(Debug, Clone)]
pub struct SweepEngine {
    fetcher: DirectFetcher,
    retry: RetryPolicy,
}

impl SweepEngine {
    pub fn new(fetcher: DirectFetcher, retry: RetryPolicy) -> Self {
        Self { fetcher, retry }
    }
}

impl NativeEngine for SweepEngine {
    fn name(&self) -> &'static str {
        "sweep"
    }

    fn crawl(&self, seed: &Url, budget: usize) -> Result<EventStream, EngineError> {
        if budget == 0 {
            return Err(EngineError::Setup("page budget must be positive".to_string()));
        }
        let host = host_of(seed)
            .ok_or_else(|| EngineError::Setup(format!("seed {} has no host", seed)))?;

        let sweep = Sweep::new(self.fetcher.clone(), self.retry.clone(), seed, host, budget);

        Ok(stream::unfold(sweep, |mut sweep| async move {
            let event = sweep.next_event().await?;
            Some((Ok(event), sweep))
        })
        .boxed())
    }
}

struct Sweep {
    fetcher: DirectFetcher,
    retry: RetryPolicy,
    host: String,
    budget: usize,
    fetched: usize,
    pending: VecDeque<Url>,
    /// Keys ever queued
    seen: HashSet<String>,
    /// Keys already fetched, including redirect targets
    landed: HashSet<String>,
}

impl Sweep {
    fn new(fetcher: DirectFetcher, retry: RetryPolicy, seed: &Url, host: String, budget: usize) -> Self {
        let seed = without_fragment(seed);
        let mut seen = HashSet::new();
        seen.insert(normalize(seed.as_str()));

        Self {
            fetcher,
            retry,
            host,
            budget,
            fetched: 0,
            pending: VecDeque::from([seed]),
            seen,
            landed: HashSet::new(),
        }
    }

    /// Fetches the next queued URL; None once the budget or the queue runs out
    async fn next_event(&mut self) -> Option<EngineEvent> {
        loop {
            if self.fetched >= self.budget {
                return None;
            }
            let url = self.pending.pop_front()?;
            let key = normalize(url.as_str());
            if !self.landed.insert(key.clone()) {
                // reached earlier as a redirect target
                continue;
            }

            tracing::trace!("Engine fetching {}", url);
            let page = match self.retry.fetch(&self.fetcher, url.as_str()).await {
                Ok(page) => page,
                Err(error) => {
                    return Some(EngineEvent::Failed {
                        url: url.to_string(),
                        error,
                    })
                }
            };

            let final_key = normalize(&page.final_url);
            if final_key != key && !self.landed.insert(final_key) {
                // an alias of a page already reported; the consumer drops it
                return Some(EngineEvent::Page(page));
            }

            self.fetched += 1;
            self.queue_links(&page);
            return Some(EngineEvent::Page(page));
        }
    }

    fn queue_links(&mut self, page: &FetchedPage) {
        let Ok(base) = Url::parse(&page.final_url) else {
            return;
        };

        for link in discover_links(&page.body, &base) {
            if host_of(&link).as_deref() != Some(self.host.as_str()) {
                continue;
            }
            if self.seen.insert(normalize(link.as_str())) {
                self.pending.push_back(link);
            }
        }
    }
}

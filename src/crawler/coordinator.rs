//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the control loop that drives one crawl run:
//! - Seeding the frontier and fixing the run's fetch strategy
//! - Consuming the native engine, or fetching one URL at a time with retries
//! - Extracting page data and feeding internal links back to the frontier
//! - Applying the page, error and time budgets
//! - Sealing the run into an immutable [`CrawlRun`]

use crate::config::Config;
use crate::crawler::engine::{EngineError, EngineEvent, FetchStrategy, NativeEngine, SweepEngine};
use crate::crawler::extract::{extract_page, ExtractOptions};
use crate::crawler::fetcher::{DirectFetcher, FetchError, FetchedPage};
use crate::crawler::frontier::Frontier;
use crate::crawler::request::{CrawlMode, CrawlRequest};
use crate::crawler::retry::RetryPolicy;
use crate::state::{CrawlRun, PageResult, RunLedger, RunOutcome, RunPhase, StopReason};
use crate::url::{host_of, normalize};
use crate::{KumoError, Result};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Drives crawl runs
///
/// A coordinator holds only immutable collaborators, so one instance can serve
/// many concurrent runs. Everything a run mutates lives in that run's own
/// context.
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: DirectFetcher,
    engine: Option<Arc<dyn NativeEngine>>,
    retry: RetryPolicy,
}

impl Coordinator {
    /// Creates a coordinator from explicit collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - The direct-HTTP fetcher
    /// * `engine` - The native engine for multipage runs, if any
    pub fn new(
        config: Arc<Config>,
        fetcher: DirectFetcher,
        engine: Option<Arc<dyn NativeEngine>>,
    ) -> Result<Self> {
        let retry = RetryPolicy::from_config(&config.retry)?;
        Ok(Self {
            config,
            fetcher,
            engine,
            retry,
        })
    }

    /// Creates a coordinator with the built-in sweep engine
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let fetcher = DirectFetcher::from_config(&config)?;
        let retry = RetryPolicy::from_config(&config.retry)?;
        let engine: Arc<dyn NativeEngine> = Arc::new(SweepEngine::new(fetcher.clone(), retry));
        Self::new(config, fetcher, Some(engine))
    }

    /// Runs one crawl to completion
    ///
    /// Budget exhaustion, deadline expiry and a failing seed are normal
    /// endings: the run is returned with whatever pages it gathered. An `Err`
    /// means the orchestrator itself misbehaved.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use kumo_crawl::config::Config;
    /// use kumo_crawl::crawler::{Coordinator, CrawlMode, CrawlRequest, FeatureFlags};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let coordinator = Coordinator::from_config(Arc::new(Config::default()))?;
    /// let request = CrawlRequest::new(
    ///     "https://example.com/",
    ///     CrawlMode::Multipage,
    ///     20,
    ///     500,
    ///     FeatureFlags::default(),
    /// )?;
    /// let run = coordinator.run(&request).await?;
    /// println!("{} pages", run.pages().len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, request: &CrawlRequest) -> Result<CrawlRun> {
        let mut ctx = self.seed(request);
        tracing::info!(
            "Starting {} crawl of {} (budget {}, strategy {})",
            request.mode(),
            request.seed(),
            ctx.page_budget,
            ctx.strategy
        );

        ctx.transition(RunPhase::Running)?;

        let mut finished = None;
        if ctx.strategy == FetchStrategy::Native {
            match self.run_native(&mut ctx).await {
                Ok(reason) => finished = Some(reason),
                Err(error) => ctx.fall_back(&error),
            }
        }
        let reason = match finished {
            Some(reason) => reason,
            None => self.run_direct(&mut ctx).await,
        };

        ctx.transition(RunPhase::Draining(reason))?;
        let run = ctx.seal()?;

        tracing::info!(
            "Crawl of {} finished ({}): {} pages, {} errors, {} visited, {:.2} pages/sec via {}",
            run.seed(),
            reason,
            run.pages().len(),
            run.error_count(),
            run.visited_count(),
            run.pages_per_second(),
            run.strategy()
        );

        Ok(run)
    }

    /// Seeding: frontier, counters, deadline and strategy for a new run
    fn seed<'r>(&self, request: &'r CrawlRequest) -> RunContext<'r> {
        let strategy = match (request.mode(), &self.engine) {
            (CrawlMode::Single, _) => FetchStrategy::Direct,
            (CrawlMode::Multipage, Some(_)) => FetchStrategy::Native,
            (CrawlMode::Multipage, None) => {
                tracing::debug!("No native engine configured, using direct HTTP");
                FetchStrategy::Direct
            }
        };

        let mut frontier = Frontier::new();
        frontier.offer(request.seed().as_str());

        let crawler = &self.config.crawler;
        RunContext {
            request,
            seed_host: host_of(request.seed()).unwrap_or_default(),
            frontier,
            ledger: RunLedger::start(),
            phase: RunPhase::Seeding,
            strategy,
            fell_back: false,
            deadline: Instant::now() + crawler.max_crawl_duration(),
            page_budget: request.page_budget() as usize,
            error_budget: crawler.error_budget(request.page_budget()),
            max_bytes: self.fetcher.max_bytes(),
        }
    }

    /// Consumes native engine events until a stop condition or engine failure
    async fn run_native(&self, ctx: &mut RunContext<'_>) -> std::result::Result<StopReason, EngineError> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| EngineError::Setup("no native engine configured".to_string()))?;
        tracing::debug!("Handing {} to native engine {}", ctx.request.seed(), engine.name());
        let mut events = engine.crawl(ctx.request.seed(), ctx.page_budget)?;

        loop {
            if let Some(reason) = ctx.stop_reason() {
                return Ok(reason);
            }

            match events.next().await {
                None => return Ok(StopReason::EngineExhausted),
                Some(Err(error)) => return Err(error),
                Some(Ok(EngineEvent::Page(page))) => {
                    if !ctx.frontier.mark_visited(&page.url) {
                        tracing::debug!("Engine returned already visited {}", page.url);
                        continue;
                    }
                    if page.body.len() as u64 > ctx.max_bytes {
                        tracing::debug!("Skipping oversized page {}", page.url);
                        continue;
                    }
                    let url = page.url.clone();
                    ctx.record_page(url, page);
                }
                Some(Ok(EngineEvent::Failed { url, error })) => {
                    if ctx.frontier.mark_visited(&url) && error.is_retryable() {
                        tracing::warn!("Engine failed to fetch {}: {}", url, error);
                        ctx.ledger.record_error();
                    }
                }
            }
        }
    }

    /// The direct-HTTP control loop: one URL at a time, in frontier order
    async fn run_direct(&self, ctx: &mut RunContext<'_>) -> StopReason {
        loop {
            if let Some(reason) = ctx.stop_reason() {
                return reason;
            }

            let Some(entry) = ctx.frontier.next() else {
                return StopReason::FrontierExhausted;
            };
            ctx.frontier.mark_visited(&entry.url);
            tracing::debug!("Processing URL: {}", entry.url);

            match self.retry.fetch(&self.fetcher, &entry.url).await {
                Ok(page) => ctx.record_page(entry.url, page),
                Err(FetchError::TooLarge { limit }) => {
                    tracing::debug!("Skipping {}: larger than {} bytes", entry.url, limit);
                }
                Err(error) => {
                    tracing::warn!("Giving up on {}: {}", entry.url, error);
                    ctx.ledger.record_error();
                }
            }

            if ctx.request.mode() == CrawlMode::Single {
                return StopReason::SingleModeComplete;
            }
        }
    }
}

/// Everything one run mutates; owned by that run's control loop alone
struct RunContext<'r> {
    request: &'r CrawlRequest,
    seed_host: String,
    frontier: Frontier,
    ledger: RunLedger,
    phase: RunPhase,
    strategy: FetchStrategy,
    fell_back: bool,
    deadline: Instant,
    page_budget: usize,
    error_budget: u32,
    max_bytes: u64,
}

impl RunContext<'_> {
    fn transition(&mut self, next: RunPhase) -> Result<()> {
        if !self.phase.can_transition_to(&next) {
            return Err(KumoError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!("Run phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn stop_reason(&self) -> Option<StopReason> {
        if self.ledger.page_count() >= self.page_budget {
            Some(StopReason::PageBudget)
        } else if Instant::now() > self.deadline {
            Some(StopReason::Deadline)
        } else if self.ledger.error_count() >= self.error_budget {
            Some(StopReason::ErrorBudget)
        } else {
            None
        }
    }

    /// Switches the rest of the run to direct HTTP; never switches back
    fn fall_back(&mut self, error: &EngineError) {
        tracing::warn!(
            "Native engine unusable for {} ({}), continuing with direct HTTP",
            self.request.seed(),
            error
        );
        self.strategy = FetchStrategy::Direct;
        self.fell_back = true;
    }

    fn record_page(&mut self, url: String, page: FetchedPage) {
        let seed = self.request.seed();
        let page_url = Url::parse(&page.final_url)
            .or_else(|_| Url::parse(&url))
            .unwrap_or_else(|_| seed.clone());

        // a redirect target is the same page; do not fetch it again
        if normalize(&page.final_url) != normalize(&url) && !self.frontier.mark_visited(&page.final_url) {
            tracing::debug!("{} redirected to already visited {}", url, page.final_url);
            return;
        }

        let flags = self.request.features();
        let data = extract_page(
            &page.body,
            &page_url,
            &self.seed_host,
            ExtractOptions {
                images: flags.extract_images,
                meta: flags.extract_meta,
            },
        );

        if self.request.mode() == CrawlMode::Multipage {
            let mut queued = 0;
            for link in data.links.iter().filter(|l| !l.is_external) {
                if self.frontier.offer(&link.href) {
                    queued += 1;
                }
            }
            tracing::debug!("{}: queued {} new links", url, queued);
        }

        self.ledger.push_page(PageResult {
            url,
            status: page.status,
            title: data.title,
            content: page.body,
            links: if flags.extract_links {
                data.links
            } else {
                Vec::new()
            },
            images: data.images,
            meta_tags: data.meta_tags,
            fetched_at: Utc::now(),
        });
    }

    /// Draining -> Sealed
    fn seal(mut self) -> Result<CrawlRun> {
        let RunPhase::Draining(stop_reason) = self.phase else {
            return Err(KumoError::InvalidTransition {
                from: self.phase,
                to: RunPhase::Sealed,
            });
        };
        self.transition(RunPhase::Sealed)?;

        let outcome = RunOutcome {
            seed: self.request.seed().to_string(),
            mode: self.request.mode(),
            stop_reason,
            strategy: self.strategy,
            fell_back: self.fell_back,
            visited_count: self.frontier.visited_count(),
            unvisited_remaining: self.frontier.len(),
        };
        Ok(self.ledger.seal(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::request::FeatureFlags;
    use std::time::Duration;

    fn coordinator() -> Coordinator {
        let config = Arc::new(Config::default());
        let fetcher = DirectFetcher::from_config(&config).unwrap();
        Coordinator::new(config, fetcher, None).unwrap()
    }

    fn request(mode: CrawlMode, max_pages: i64) -> CrawlRequest {
        CrawlRequest::new(
            "https://example.com/",
            mode,
            max_pages,
            500,
            FeatureFlags::default(),
        )
        .unwrap()
    }

    fn page(url: &str, body: &str) -> FetchedPage {
        FetchedPage {
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            headers: Default::default(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_single_mode_uses_direct_strategy() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Single, 10);
        let ctx = coordinator.seed(&request);
        assert_eq!(ctx.strategy, FetchStrategy::Direct);
        assert_eq!(ctx.page_budget, 1);
        assert_eq!(ctx.frontier.len(), 1);
    }

    #[test]
    fn test_multipage_prefers_native_when_available() {
        let coordinator = Coordinator::from_config(Arc::new(Config::default())).unwrap();
        let request = request(CrawlMode::Multipage, 10);
        let ctx = coordinator.seed(&request);
        assert_eq!(ctx.strategy, FetchStrategy::Native);
        assert_eq!(ctx.error_budget, 3);
    }

    #[test]
    fn test_stop_conditions() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Multipage, 2);
        let mut ctx = coordinator.seed(&request);
        assert_eq!(ctx.stop_reason(), None);

        ctx.ledger.record_error();
        assert_eq!(ctx.stop_reason(), Some(StopReason::ErrorBudget));

        let mut ctx = coordinator.seed(&request);
        ctx.deadline = Instant::now() - Duration::from_millis(1);
        assert_eq!(ctx.stop_reason(), Some(StopReason::Deadline));

        let mut ctx = coordinator.seed(&request);
        ctx.record_page("https://example.com/".to_string(), page("https://example.com/", ""));
        ctx.record_page("https://example.com/x".to_string(), page("https://example.com/x", ""));
        assert_eq!(ctx.stop_reason(), Some(StopReason::PageBudget));
    }

    #[test]
    fn test_record_page_feeds_internal_links_only() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Multipage, 10);
        let mut ctx = coordinator.seed(&request);
        let seed = ctx.frontier.next().unwrap();
        ctx.frontier.mark_visited(&seed.url);

        ctx.record_page(
            seed.url.clone(),
            page(
                &seed.url,
                r#"<a href="/a">A</a><a href="/a#x">A again</a><a href="https://other.com/">O</a><a href="/">Home</a>"#,
            ),
        );

        assert_eq!(ctx.frontier.len(), 1);
        assert_eq!(ctx.frontier.next().unwrap().url, "https://example.com/a");
        assert_eq!(ctx.ledger.page_count(), 1);
    }

    #[test]
    fn test_redirect_to_visited_page_is_not_recorded() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Multipage, 10);
        let mut ctx = coordinator.seed(&request);
        let seed = ctx.frontier.next().unwrap();
        ctx.frontier.mark_visited(&seed.url);
        ctx.record_page(seed.url.clone(), page(&seed.url, ""));

        ctx.frontier.mark_visited("https://example.com/home");
        let mut alias = page("https://example.com/home", r#"<a href="/new">N</a>"#);
        alias.final_url = seed.url.clone();
        ctx.record_page("https://example.com/home".to_string(), alias);

        assert_eq!(ctx.ledger.page_count(), 1);
        assert!(ctx.frontier.is_empty());

        // a first-time redirect target is still recorded
        let mut moved = page("https://example.com/old", "");
        moved.final_url = "https://example.com/new".to_string();
        ctx.record_page("https://example.com/old".to_string(), moved);
        assert_eq!(ctx.ledger.page_count(), 2);
        assert!(ctx.frontier.is_visited("https://example.com/new"));
    }

    #[test]
    fn test_single_mode_does_not_expand_frontier() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Single, 1);
        let mut ctx = coordinator.seed(&request);
        let seed = ctx.frontier.next().unwrap();
        ctx.record_page(seed.url.clone(), page(&seed.url, r#"<a href="/a">A</a>"#));
        assert!(ctx.frontier.is_empty());
    }

    #[test]
    fn test_fall_back_is_sticky() {
        let coordinator = Coordinator::from_config(Arc::new(Config::default())).unwrap();
        let request = request(CrawlMode::Multipage, 10);
        let mut ctx = coordinator.seed(&request);
        ctx.fall_back(&EngineError::Aborted("boom".to_string()));
        assert_eq!(ctx.strategy, FetchStrategy::Direct);
        assert!(ctx.fell_back);
    }

    #[test]
    fn test_seal_requires_draining() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Single, 1);
        let mut ctx = coordinator.seed(&request);
        assert!(ctx.transition(RunPhase::Sealed).is_err());
        ctx.transition(RunPhase::Running).unwrap();
        assert!(matches!(
            ctx.seal(),
            Err(KumoError::InvalidTransition {
                from: RunPhase::Running,
                to: RunPhase::Sealed
            })
        ));
    }

    #[test]
    fn test_seal_reports_leftover_frontier() {
        let coordinator = coordinator();
        let request = request(CrawlMode::Multipage, 1);
        let mut ctx = coordinator.seed(&request);
        let seed = ctx.frontier.next().unwrap();
        ctx.frontier.mark_visited(&seed.url);
        ctx.record_page(
            seed.url.clone(),
            page(&seed.url, r#"<a href="/a">A</a><a href="/b">B</a>"#),
        );
        ctx.transition(RunPhase::Running).unwrap();
        ctx.transition(RunPhase::Draining(StopReason::PageBudget)).unwrap();

        let run = ctx.seal().unwrap();
        assert_eq!(run.pages().len(), 1);
        assert_eq!(run.unvisited_remaining(), 2);
        assert_eq!(run.stop_reason(), StopReason::PageBudget);
    }
}

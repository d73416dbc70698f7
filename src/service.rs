//! Request handling: validation, admission, crawling and reply assembly
//!
//! [`CrawlService`] is the surface an HTTP layer or the CLI talks to. It turns
//! a loosely typed [`RequestBody`] into a validated [`CrawlRequest`], waits for
//! a slot at the [`ConcurrencyGate`], runs the [`Coordinator`], applies
//! signature detection to the sealed run and builds the JSON reply.

use crate::config::Config;
use crate::crawler::{Coordinator, CrawlMode, CrawlRequest, DirectFetcher, FeatureFlags, NativeEngine};
use crate::detect::SignatureSet;
use crate::gate::ConcurrencyGate;
use crate::output::{CrawlResponse, Detections, ErrorResponse};
use crate::state::CrawlRun;
use crate::{KumoError, RequestError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Wire code for a run that failed inside the orchestrator
pub const SCRAPING_ERROR: &str = "SCRAPING_ERROR";

/// Wire code for a request that arrived after shutdown began
pub const SHUTTING_DOWN: &str = "SHUTTING_DOWN";

/// Incoming request body; every field is optional on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub url: Option<String>,
    pub mode: Option<String>,
    pub max_pages: Option<i64>,
    pub extract_links: Option<bool>,
    pub extract_images: Option<bool>,
    pub extract_meta: Option<bool>,
    pub detect_technologies: Option<bool>,
    #[serde(rename = "detectCMS", alias = "detectCms")]
    pub detect_cms: Option<bool>,
}

impl RequestBody {
    /// A body naming only the seed URL
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// A status code plus JSON body
#[derive(Debug, Clone)]
pub struct ServiceReply {
    pub status: u16,
    pub body: Value,
}

/// A request that did not produce a crawl reply
#[derive(Debug, Clone)]
pub struct ServiceFailure {
    pub status: u16,
    pub body: ErrorResponse,
}

pub struct CrawlService {
    config: Arc<Config>,
    coordinator: Coordinator,
    gate: ConcurrencyGate,
    technologies: SignatureSet,
    cms: SignatureSet,
}

impl CrawlService {
    /// Builds a service with the built-in parallel engine
    pub fn new(config: Config) -> crate::Result<Self> {
        let config = Arc::new(config);
        let coordinator = Coordinator::from_config(config.clone())?;
        Ok(Self::assemble(config, coordinator))
    }

    /// Builds a service with the given native engine, or none
    pub fn with_engine(
        config: Config,
        engine: Option<Arc<dyn NativeEngine>>,
    ) -> crate::Result<Self> {
        let config = Arc::new(config);
        let fetcher = DirectFetcher::from_config(&config)?;
        let coordinator = Coordinator::new(config.clone(), fetcher, engine)?;
        Ok(Self::assemble(config, coordinator))
    }

    fn assemble(config: Arc<Config>, coordinator: Coordinator) -> Self {
        Self {
            gate: ConcurrencyGate::new(config.service.max_active_runs),
            config,
            coordinator,
            technologies: SignatureSet::default_technologies(),
            cms: SignatureSet::default_cms(),
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Adds a technology signature evaluated after the built-in ones
    pub fn add_technology_rule(&mut self, label: &str, pattern: &str) -> Result<(), regex::Error> {
        self.technologies.push(label, pattern)
    }

    /// Adds a CMS signature evaluated after the built-in ones
    pub fn add_cms_rule(&mut self, label: &str, pattern: &str) -> Result<(), regex::Error> {
        self.cms.push(label, pattern)
    }

    /// Stops admitting new runs; runs already admitted finish normally
    pub fn shutdown(&self) {
        tracing::info!("Crawl service shutting down, {} runs active", self.gate.active());
        self.gate.close();
    }

    /// Checks a request body and applies deployment defaults
    pub fn validate(&self, body: &RequestBody) -> Result<CrawlRequest, RequestError> {
        let url = body
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(RequestError::MissingUrl)?;

        let mode = match body.mode.as_deref() {
            Some(mode) => mode.parse()?,
            None => CrawlMode::default(),
        };

        let crawler = &self.config.crawler;
        let max_pages = body
            .max_pages
            .unwrap_or_else(|| i64::from(crawler.default_max_pages));

        let defaults = FeatureFlags::default();
        let features = FeatureFlags {
            extract_links: body.extract_links.unwrap_or(defaults.extract_links),
            extract_images: body.extract_images.unwrap_or(defaults.extract_images),
            extract_meta: body.extract_meta.unwrap_or(defaults.extract_meta),
            detect_technologies: body
                .detect_technologies
                .unwrap_or(defaults.detect_technologies),
            detect_cms: body.detect_cms.unwrap_or(defaults.detect_cms),
        };

        CrawlRequest::new(url, mode, max_pages, crawler.max_pages_cap, features)
    }

    /// Handles one request end to end and returns typed results
    pub async fn execute(&self, body: RequestBody) -> Result<CrawlResponse, ServiceFailure> {
        let received = Instant::now();

        let request = self.validate(&body).map_err(|e| {
            tracing::debug!("Rejected request: {}", e);
            ServiceFailure {
                status: 400,
                body: ErrorResponse::from(&e),
            }
        })?;

        let run = self.crawl(&request).await.map_err(|e| match e {
            KumoError::GateClosed => ServiceFailure {
                status: 503,
                body: ErrorResponse::new(e.to_string(), SHUTTING_DOWN),
            },
            e => {
                tracing::error!("Crawl of {} failed: {}", request.seed(), e);
                ServiceFailure {
                    status: 500,
                    body: ErrorResponse::new(e.to_string(), SCRAPING_ERROR),
                }
            }
        })?;

        let detections = self.detect(&request, &run);
        let response_time = received.elapsed().as_millis() as u64;
        Ok(CrawlResponse::from_run(&run, detections, response_time))
    }

    /// Handles one request and renders the reply as status plus JSON
    pub async fn handle(&self, body: RequestBody) -> ServiceReply {
        let rendered = match self.execute(body).await {
            Ok(response) => serde_json::to_value(&response).map(|body| (200, body)),
            Err(failure) => serde_json::to_value(&failure.body).map(|body| (failure.status, body)),
        };

        match rendered {
            Ok((status, body)) => ServiceReply { status, body },
            Err(e) => {
                tracing::error!("Failed to serialize reply: {}", e);
                ServiceReply {
                    status: 500,
                    body: serde_json::json!({
                        "error": e.to_string(),
                        "code": SCRAPING_ERROR,
                    }),
                }
            }
        }
    }

    /// Runs a validated request once a gate slot is free
    pub async fn crawl(&self, request: &CrawlRequest) -> crate::Result<CrawlRun> {
        if self.gate.active() >= self.gate.capacity() {
            tracing::debug!(
                "Run for {} waiting for a slot ({} already waiting)",
                request.seed(),
                self.gate.waiting()
            );
        }
        let _pass = self.gate.admit().await?;
        self.coordinator.run(request).await
    }

    fn detect(&self, request: &CrawlRequest, run: &CrawlRun) -> Detections {
        let features = request.features();
        let documents = || run.pages().iter().map(|p| p.content.as_str());

        Detections {
            technologies: if features.detect_technologies {
                self.technologies.detect_all(documents())
            } else {
                Vec::new()
            },
            cms: if features.detect_cms {
                self.cms.detect_all(documents())
            } else {
                Vec::new()
            },
        }
    }
}

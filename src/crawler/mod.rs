//! Crawler module for page fetching and run orchestration
//!
//! This module contains the core crawling logic, including:
//! - Request validation and feature flags
//! - Direct HTTP fetching with per-host retry policy
//! - The native engine strategy and its built-in implementation
//! - HTML extraction and link discovery
//! - The frontier and the per-run control loop

mod coordinator;
mod engine;
mod extract;
mod fetcher;
mod frontier;
mod request;
mod retry;

pub use coordinator::Coordinator;
pub use engine::{EngineError, EngineEvent, EventStream, FetchStrategy, NativeEngine, SweepEngine};
pub use extract::{
    discover_links, extract_page, ExtractOptions, ExtractedImage, ExtractedLink, MetaTag,
    PageData, NO_TITLE,
};
pub use fetcher::{build_http_client, DirectFetcher, FailureClass, FetchError, FetchedPage};
pub use frontier::{Frontier, FrontierEntry};
pub use request::{CrawlMode, CrawlRequest, FeatureFlags};
pub use retry::RetryPolicy;

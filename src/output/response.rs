//! JSON reply bodies
//!
//! Field names are camelCase on the wire.

use crate::crawler::{CrawlMode, ExtractedImage, ExtractedLink, FetchStrategy, MetaTag};
use crate::state::{CrawlRun, PageResult, StopReason};
use crate::RequestError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Body of a successful crawl reply
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResponse {
    pub url: String,
    pub mode: CrawlMode,
    pub summary: Summary,
    pub pages: Vec<PageResult>,
    pub extracted_data: ExtractedData,
    pub performance: Performance,
    /// Milliseconds from request receipt to reply
    pub response_time: u64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_pages: usize,
    pub total_links: usize,
    pub total_images: usize,
    pub total_meta_tags: usize,
    pub technologies_found: usize,
    pub cms_detected: Option<String>,
}

/// Run-wide aggregates, deduplicated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub links: Vec<ExtractedLink>,
    pub images: Vec<ExtractedImage>,
    pub meta_tags: Vec<MetaTag>,
    pub technologies: Vec<String>,
    pub cms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub start_time: String,
    pub end_time: String,
    /// Run duration in milliseconds
    pub total_time: u64,
    pub pages_per_second: f64,
    pub strategy: FetchStrategy,
    pub fell_back: bool,
    pub stop_reason: StopReason,
    pub error_count: u32,
}

/// Body of a rejected or failed request
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub timestamp: String,
}

/// Labels produced by signature detection for one run
#[derive(Debug, Clone, Default)]
pub struct Detections {
    pub technologies: Vec<String>,
    pub cms: Vec<String>,
}

impl CrawlResponse {
    /// Assembles the reply for a sealed run
    pub fn from_run(run: &CrawlRun, detections: Detections, response_time: u64) -> Self {
        let summary = Summary {
            total_pages: run.pages().len(),
            total_links: run.links().len(),
            total_images: run.images().len(),
            total_meta_tags: run.meta_tags().len(),
            technologies_found: detections.technologies.len(),
            cms_detected: detections.cms.first().cloned(),
        };

        let performance = Performance {
            start_time: rfc3339(run.started_at()),
            end_time: rfc3339(run.finished_at()),
            total_time: run.elapsed().as_millis() as u64,
            pages_per_second: run.pages_per_second(),
            strategy: run.strategy(),
            fell_back: run.fell_back(),
            stop_reason: run.stop_reason(),
            error_count: run.error_count(),
        };

        Self {
            url: run.seed().to_string(),
            mode: run.mode(),
            summary,
            pages: run.pages().to_vec(),
            extracted_data: ExtractedData {
                links: run.links().to_vec(),
                images: run.images().to_vec(),
                meta_tags: run.meta_tags().to_vec(),
                technologies: detections.technologies,
                cms: detections.cms,
            },
            performance,
            response_time,
            timestamp: rfc3339(Utc::now()),
        }
    }
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            timestamp: rfc3339(Utc::now()),
        }
    }
}

impl From<&RequestError> for ErrorResponse {
    fn from(error: &RequestError) -> Self {
        Self::new(error.to_string(), error.code())
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

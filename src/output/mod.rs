//! Output module for crawl replies and reports
//!
//! This module handles:
//! - The JSON reply and error bodies returned for each request
//! - Markdown reports of finished runs

mod markdown;
mod response;

pub use markdown::{format_markdown_summary, write_markdown_report};
pub use response::{
    CrawlResponse, Detections, ErrorResponse, ExtractedData, Performance, Summary,
};

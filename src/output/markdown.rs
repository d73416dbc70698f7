//! Markdown report generation
//!
//! Renders a crawl reply as a human-readable report: run information,
//! totals, detected signatures and a per-page table.

use crate::output::response::CrawlResponse;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report for one or more crawl replies
///
/// # Arguments
///
/// * `responses` - The replies to report on, in request order
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_report(responses: &[CrawlResponse], output_path: &Path) -> crate::Result<()> {
    let mut markdown = String::from("# Kumo-Crawl Report\n\n");
    for response in responses {
        markdown.push_str(&format_markdown_summary(response));
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;
    Ok(())
}

/// Formats one crawl reply as a markdown section
pub fn format_markdown_summary(response: &CrawlResponse) -> String {
    let mut md = String::new();
    let perf = &response.performance;

    md.push_str(&format!("## {}\n\n", response.url));

    md.push_str("### Run Information\n\n");
    md.push_str(&format!("- **Mode**: {}\n", response.mode));
    md.push_str(&format!("- **Started**: {}\n", perf.start_time));
    md.push_str(&format!("- **Finished**: {}\n", perf.end_time));
    md.push_str(&format!(
        "- **Duration**: {} ms ({:.2} pages/sec)\n",
        perf.total_time, perf.pages_per_second
    ));
    md.push_str(&format!("- **Stopped**: {}\n", perf.stop_reason));
    md.push_str(&format!("- **Strategy**: {}", perf.strategy));
    if perf.fell_back {
        md.push_str(" (after native engine failure)");
    }
    md.push_str("\n\n");

    md.push_str("### Totals\n\n");
    md.push_str(&format!("- **Pages**: {}\n", response.summary.total_pages));
    md.push_str(&format!("- **Failed Pages**: {}\n", perf.error_count));
    md.push_str(&format!("- **Links**: {}\n", response.summary.total_links));
    md.push_str(&format!("- **Images**: {}\n", response.summary.total_images));
    md.push_str(&format!("- **Meta Tags**: {}\n\n", response.summary.total_meta_tags));

    let data = &response.extracted_data;
    if !data.technologies.is_empty() || !data.cms.is_empty() {
        md.push_str("### Detected\n\n");
        if !data.cms.is_empty() {
            md.push_str(&format!("- **CMS**: {}\n", data.cms.join(", ")));
        }
        if !data.technologies.is_empty() {
            md.push_str(&format!("- **Technologies**: {}\n", data.technologies.join(", ")));
        }
        md.push('\n');
    }

    if !response.pages.is_empty() {
        md.push_str("### Pages\n\n");
        md.push_str("| URL | Status | Title | Links |\n");
        md.push_str("|-----|--------|-------|-------|\n");
        for page in &response.pages {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                page.url,
                page.status,
                page.title.replace('|', "\\|"),
                page.links.len()
            ));
        }
        md.push('\n');
    }

    md
}

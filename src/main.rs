//! Kumo-Crawl main entry point
//!
//! This is the command-line interface for the Kumo-Crawl bounded site crawler.

use anyhow::{bail, Context};
use clap::Parser;
use futures::future::join_all;
use kumo_crawl::config::{default_config, load_config_with_hash};
use kumo_crawl::output::write_markdown_report;
use kumo_crawl::{CrawlService, RequestBody};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Kumo-Crawl: a bounded site crawler
///
/// Crawls one page, or a bounded set of same-site pages, from each seed URL
/// and prints the extracted links, images, metadata and detected technologies
/// as JSON.
#[derive(Parser, Debug)]
#[command(name = "kumo-crawl")]
#[command(version)]
#[command(about = "A bounded site crawler", long_about = None)]
struct Cli {
    /// Seed URLs to crawl
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Crawl mode: single or multipage
    #[arg(short, long, default_value = "single")]
    mode: String,

    /// Page budget per seed (defaults to the configured value)
    #[arg(short = 'n', long)]
    max_pages: Option<i64>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Also write a markdown report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Leave links out of the reply
    #[arg(long)]
    no_links: bool,

    /// Skip image extraction
    #[arg(long)]
    no_images: bool,

    /// Skip meta tag extraction
    #[arg(long)]
    no_meta: bool,

    /// Skip technology detection
    #[arg(long)]
    no_technologies: bool,

    /// Skip CMS detection
    #[arg(long)]
    no_cms: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn request_for(&self, url: &str) -> RequestBody {
        RequestBody {
            url: Some(url.to_string()),
            mode: Some(self.mode.clone()),
            max_pages: self.max_pages,
            extract_links: Some(!self.no_links),
            extract_images: Some(!self.no_images),
            extract_meta: Some(!self.no_meta),
            detect_technologies: Some(!self.no_technologies),
            detect_cms: Some(!self.no_cms),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => default_config().context("invalid configuration from environment")?,
    };

    let service = CrawlService::new(config).context("failed to initialize crawl service")?;

    let bodies: Vec<RequestBody> = cli.urls.iter().map(|url| cli.request_for(url)).collect();
    let runs = join_all(bodies.into_iter().map(|body| service.execute(body)));

    let results = tokio::select! {
        results = runs => results,
        _ = tokio::signal::ctrl_c() => {
            service.shutdown();
            bail!("interrupted");
        }
    };

    let mut replies = Vec::with_capacity(results.len());
    let mut crawled = Vec::new();
    let mut failures = 0;
    for result in results {
        match result {
            Ok(response) => {
                replies.push(serde_json::to_value(&response)?);
                crawled.push(response);
            }
            Err(failure) => {
                tracing::error!("{} ({})", failure.body.error, failure.body.code);
                failures += 1;
                replies.push(serde_json::to_value(&failure.body)?);
            }
        }
    }

    let output = match replies.len() {
        1 => replies.remove(0),
        _ => Value::Array(replies),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(path) = &cli.report {
        write_markdown_report(&crawled, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!("Report written to: {}", path.display());
    }

    if failures > 0 {
        bail!("{} of {} requests failed", failures, cli.urls.len());
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries only the JSON reply.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kumo_crawl=info,warn"),
            1 => EnvFilter::new("kumo_crawl=debug,info"),
            2 => EnvFilter::new("kumo_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

//! Content extraction from fetched markup
//!
//! Pulls the title, outbound links, images and meta tags out of a page. This is
//! a pure function of the markup and the page URL: no network, no errors.
//! Broken markup simply yields fewer matches.

use crate::url::{host_of, is_web_url, without_fragment};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

/// Title reported for pages without a usable `<title>`
pub const NO_TITLE: &str = "No title";

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLink {
    /// Absolute URL, fragment removed
    pub href: String,
    /// Visible link text, whitespace collapsed
    pub text: String,
    /// True if the link's host differs from the seed host
    pub is_external: bool,
}

/// An image found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedImage {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A `<meta>` tag with a name-like attribute and content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaTag {
    pub name: String,
    pub content: String,
}

/// What to pull out of a page besides the title and links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub images: bool,
    pub meta: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            images: true,
            meta: true,
        }
    }
}

/// Structured data extracted from one page
#[derive(Debug, Clone, Default)]
pub struct PageData {
    pub title: String,
    pub links: Vec<ExtractedLink>,
    pub images: Vec<ExtractedImage>,
    pub meta_tags: Vec<MetaTag>,
}

/// Extracts page data from markup
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` resolved against the page URL (`/path` resolves
///   against the page origin)
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links (same page anchors)
/// - Anything that is not http(s) after resolution
///
/// # Arguments
///
/// * `html` - The page markup
/// * `page_url` - The page's own URL, used to resolve relative references
/// * `seed_host` - Host of the run's seed, used to flag external links
/// * `options` - Whether to extract images and meta tags
///
/// # Example
///
/// ```
/// use kumo_crawl::crawler::{extract_page, ExtractOptions};
/// use url::Url;
///
/// let html = r#"<title>Home</title><a href="/about">About</a><a href="https://other.com">Out</a>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let data = extract_page(html, &page_url, "example.com", ExtractOptions::default());
///
/// assert_eq!(data.title, "Home");
/// assert_eq!(data.links[0].href, "https://example.com/about");
/// assert!(!data.links[0].is_external);
/// assert!(data.links[1].is_external);
/// ```
pub fn extract_page(html: &str, page_url: &Url, seed_host: &str, options: ExtractOptions) -> PageData {
    let document = Html::parse_document(html);

    PageData {
        title: extract_title(&document).unwrap_or_else(|| NO_TITLE.to_string()),
        links: extract_links(&document, page_url, seed_host),
        images: if options.images {
            extract_images(&document, page_url)
        } else {
            Vec::new()
        },
        meta_tags: if options.meta {
            extract_meta(&document)
        } else {
            Vec::new()
        },
    }
}

/// Returns the absolute http(s) targets of every followable anchor
///
/// Used by the native engine, which only needs targets, not link metadata.
pub fn discover_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    anchors(&document)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_reference(href, page_url))
        .collect()
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn anchors(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    let a_selector = selector("a[href]");
    a_selector
        .map(|sel| document.select(&sel).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .filter(|element| element.value().attr("download").is_none())
}

fn extract_links(document: &Html, page_url: &Url, seed_host: &str) -> Vec<ExtractedLink> {
    let seed_host = seed_host.to_ascii_lowercase();

    anchors(document)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let target = resolve_reference(href, page_url)?;
            let is_external = host_of(&target).as_deref() != Some(seed_host.as_str());
            Some(ExtractedLink {
                href: target.to_string(),
                text: collapse_whitespace(&element.text().collect::<String>()),
                is_external,
            })
        })
        .collect()
}

fn extract_images(document: &Html, page_url: &Url) -> Vec<ExtractedImage> {
    let Some(img_selector) = selector("img") else {
        return Vec::new();
    };

    document
        .select(&img_selector)
        .filter_map(|element| {
            let attrs = element.value();
            let raw = attrs
                .attr("src")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| attrs.attr("data-src"))?;
            let src = resolve_reference(raw, page_url)?;
            Some(ExtractedImage {
                src: src.to_string(),
                alt: attrs
                    .attr("alt")
                    .map(collapse_whitespace)
                    .filter(|alt| !alt.is_empty()),
            })
        })
        .collect()
}

fn extract_meta(document: &Html) -> Vec<MetaTag> {
    let Some(meta_selector) = selector("meta[content]") else {
        return Vec::new();
    };

    document
        .select(&meta_selector)
        .filter_map(|element| {
            let attrs = element.value();
            let name = ["name", "property", "http-equiv", "itemprop"]
                .iter()
                .find_map(|key| attrs.attr(key))
                .map(str::trim)
                .filter(|name| !name.is_empty())?;
            Some(MetaTag {
                name: name.to_string(),
                content: attrs.attr("content").unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// Resolves a reference against the page URL and validates it
///
/// Returns None for special schemes, fragment-only references, unparsable
/// references and anything that is not http(s) after resolution.
fn resolve_reference(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let resolved = page_url.join(href).ok()?;
    is_web_url(&resolved).then(|| without_fragment(&resolved))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

use url::{ParseError, Url};

/// Whether a canonical form keeps the URL fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentPolicy {
    /// Drop everything after `#` (two URLs differing only by fragment are one page)
    #[default]
    Discard,
    /// Keep the fragment as part of the canonical form
    Keep,
}

/// Normalizes an absolute URL for dedup comparison
///
/// Never fails: input that cannot be parsed comes back trimmed and lowercased.
///
/// # Normalization Steps
///
/// 1. Parse the URL (falls back to a lowercase copy of the input)
/// 2. Lowercase scheme and host, drop the default port
/// 3. Lowercase the path, collapse empty and dot segments
/// 4. Remove a trailing slash, except for the bare origin
/// 5. Keep the query string verbatim (different queries are different pages)
/// 6. Remove the fragment
///
/// # Examples
///
/// ```
/// use kumo_crawl::url::normalize;
///
/// assert_eq!(normalize("HTTPS://Example.COM/Docs/"), "https://example.com/docs");
/// assert_eq!(normalize("https://example.com"), "https://example.com/");
/// assert_eq!(normalize("https://example.com/a?q=1#top"), "https://example.com/a?q=1");
/// ```
pub fn normalize(raw: &str) -> String {
    canonicalize(raw, None, FragmentPolicy::Discard)
}

/// Normalizes a possibly relative reference against the page it was found on
///
/// `/path` resolves against the origin of `base`, other relative references
/// against `base` itself.
pub fn normalize_relative(raw: &str, base: &Url) -> String {
    canonicalize(raw, Some(base), FragmentPolicy::Discard)
}

/// Full-control form of [`normalize`]
pub fn canonicalize(raw: &str, base: Option<&Url>, fragments: FragmentPolicy) -> String {
    let trimmed = raw.trim();

    let parsed = Url::parse(trimmed).or_else(|e| match (e, base) {
        (ParseError::RelativeUrlWithoutBase, Some(base)) => base.join(trimmed),
        (e, _) => Err(e),
    });

    match parsed {
        Ok(url) => canonical_form(url, fragments),
        Err(_) => trimmed.to_lowercase(),
    }
}

fn canonical_form(mut url: Url, fragments: FragmentPolicy) -> String {
    if url.cannot_be_a_base() {
        // mailto:, data: and friends have no host or path structure
        return url.as_str().to_lowercase();
    }

    if fragments == FragmentPolicy::Discard {
        url.set_fragment(None);
    }

    let path = collapse_path(&url.path().to_lowercase());
    url.set_path(&path);

    url.to_string()
}

/// Removes empty and dot segments and the trailing slash (root stays `/`)
fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

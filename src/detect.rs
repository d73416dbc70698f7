//! Technology and CMS signature detection
//!
//! Detection is a table of `(label, pattern)` rules evaluated against page
//! markup. It runs after a crawl run is sealed and knows nothing about how the
//! pages were fetched.

use regex::Regex;

/// One signature: a label reported when `pattern` matches
#[derive(Debug, Clone)]
pub struct SignatureRule {
    pub label: String,
    pub pattern: Regex,
}

/// Ordered rule table
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    rules: Vec<SignatureRule>,
}

const TECHNOLOGY_SIGNATURES: &[(&str, &str)] = &[
    ("React", r#"(?i)data-reactroot|react(?:-dom)?(?:\.production)?(?:\.min)?\.js|__REACT_DEVTOOLS"#),
    ("Next.js", r#"(?i)__NEXT_DATA__|/_next/static/"#),
    ("Vue.js", r#"(?i)data-v-[0-9a-f]{6,}|vue(?:\.runtime)?(?:\.global)?(?:\.min)?\.js|__VUE__"#),
    ("Nuxt.js", r#"(?i)__NUXT__|/_nuxt/"#),
    ("Angular", r#"(?i)ng-version=|ng-app=|angular(?:\.min)?\.js"#),
    ("Svelte", r#"(?i)class="[^"]*svelte-[a-z0-9]+"#),
    ("jQuery", r#"(?i)jquery(?:-[0-9.]+)?(?:\.min)?\.js"#),
    ("Bootstrap", r#"(?i)bootstrap(?:\.bundle)?(?:\.min)?\.(?:css|js)"#),
    ("Tailwind CSS", r#"(?i)tailwind(?:css)?(?:\.min)?\.css|cdn\.tailwindcss\.com"#),
    ("Font Awesome", r#"(?i)font-?awesome"#),
    ("Google Analytics", r#"(?i)google-analytics\.com/(?:analytics|ga)\.js|gtag\('config'"#),
    ("Google Tag Manager", r#"(?i)googletagmanager\.com/gtm\.js"#),
    ("Cloudflare", r#"(?i)cdnjs\.cloudflare\.com|/cdn-cgi/"#),
];

const CMS_SIGNATURES: &[(&str, &str)] = &[
    ("WordPress", r#"(?i)/wp-content/|/wp-includes/|<meta[^>]+generator[^>]+wordpress"#),
    ("Drupal", r#"(?i)drupal-settings-json|/sites/default/files/|<meta[^>]+generator[^>]+drupal"#),
    ("Joomla", r#"(?i)/media/jui/|<meta[^>]+generator[^>]+joomla"#),
    ("Shopify", r#"(?i)cdn\.shopify\.com|Shopify\.theme"#),
    ("Wix", r#"(?i)static\.wixstatic\.com|<meta[^>]+generator[^>]+wix\.com"#),
    ("Squarespace", r#"(?i)static1\.squarespace\.com|<!-- This is Squarespace\. -->"#),
    ("Ghost", r#"(?i)<meta[^>]+generator[^>]+ghost"#),
    ("Webflow", r#"(?i)data-wf-page=|assets\.website-files\.com"#),
    ("Magento", r#"(?i)/static/version\d+/frontend/|Mage\.Cookies"#),
];

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from a `(label, pattern)` table
    ///
    /// Patterns that fail to compile are logged and left out.
    pub fn from_table(table: &[(&str, &str)]) -> Self {
        let mut set = Self::new();
        for (label, pattern) in table {
            if let Err(e) = set.push(label, pattern) {
                tracing::warn!("Skipping signature '{}': {}", label, e);
            }
        }
        set
    }

    /// Built-in front-end and analytics signatures
    pub fn default_technologies() -> Self {
        Self::from_table(TECHNOLOGY_SIGNATURES)
    }

    /// Built-in content management system signatures
    pub fn default_cms() -> Self {
        Self::from_table(CMS_SIGNATURES)
    }

    /// Appends a rule; it is evaluated after every existing rule
    pub fn push(&mut self, label: &str, pattern: &str) -> Result<(), regex::Error> {
        self.rules.push(SignatureRule {
            label: label.to_string(),
            pattern: Regex::new(pattern)?,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Labels whose pattern matches `markup`, in rule order, each at most once
    pub fn detect(&self, markup: &str) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !labels.contains(&rule.label) && rule.pattern.is_match(markup) {
                labels.push(rule.label.clone());
            }
        }
        labels
    }

    /// Like [`detect`](Self::detect) over several documents, merged in order
    pub fn detect_all<'a, I>(&self, documents: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut labels: Vec<String> = Vec::new();
        for document in documents {
            for label in self.detect(document) {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
        labels
    }
}

// src/urls/normalize.rs
// =============================================================================
// Canonical URL form for the crawl.
//
// Every URL that reaches the frontier, the visited set or the sitemap goes
// through UrlNormalizer::normalize first, the seed included. A canonical URL
// is same-origin with the seed, http(s), not an asset, has no fragment, and
// (depending on options) has no query string and is not an AMP variant.
// =============================================================================

use url::{Origin, Url};

use crate::config::CrawlOptions;

#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    base: Url,
    origin: Origin,
    strip_querystring: bool,
    ignore_amp: bool,
    asset_extensions: Vec<String>,
    asset_path_prefixes: Vec<String>,
}

impl UrlNormalizer {
    // Captures everything normalize() needs from the options up front
    // The crawl origin is fixed here, from the seed URL, for the whole crawl
    pub fn new(options: &CrawlOptions) -> Self {
        Self {
            origin: options.base_url.origin(),
            base: options.base_url.clone(),
            strip_querystring: options.strip_querystring,
            ignore_amp: options.ignore_amp,
            asset_extensions: options.asset_extensions.clone(),
            asset_path_prefixes: options.asset_path_prefixes.clone(),
        }
    }

    /// Normalize `raw`, resolving relative forms against the seed URL.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        self.normalize_against(raw, &self.base)
    }

    // Turns a raw link into its canonical form, or drops it
    //
    // Parameters:
    //   raw: the URL as found (absolute, root-relative or relative)
    //   base: the URL relative forms are resolved against
    //
    // Returns: Some(canonical URL), or None when the URL must be dropped
    //
    // Example:
    //   "/about#team"    -> Some("https://example.com/about")
    //   "/style.css"     -> None (asset)
    //   "https://other/" -> None (different origin)
    pub fn normalize_against(&self, raw: &str, base: &Url) -> Option<String> {
        // Resolve to an absolute URL; anything unparseable is dropped
        let mut url = base.join(raw).ok()?;

        // Stay on the seed's origin (scheme + host + port)
        if url.origin() != self.origin {
            return None;
        }

        // Only web pages; mailto:, ftp: etc. never make it past here
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        // Stylesheets, scripts, images and framework bundles are not pages
        if self.is_asset(&url) {
            return None;
        }

        // The fragment never changes the page, so it always goes
        url.set_fragment(None);

        // The query string goes too unless we were asked to keep it
        if self.strip_querystring {
            url.set_query(None);
        }

        // AMP variants duplicate a regular page
        if self.ignore_amp && is_amp(&url) {
            return None;
        }

        Some(url.to_string())
    }

    // Checks whether a URL points at a static asset rather than a page
    //
    // Both checks run on the lower-cased path:
    // 1. the path starts with one of the asset prefixes (e.g. /_next/)
    // 2. the last segment ends in one of the asset extensions (e.g. .css)
    fn is_asset(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();

        // Check 1: asset directory prefix
        if self
            .asset_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }

        // Check 2: extension of the last path segment only,
        // so "/v1.2/notes" is still a page
        let last_segment = path.rsplit('/').next().unwrap_or("");
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => self.asset_extensions.iter().any(|known| known == ext),
            None => false,
        }
    }
}

// Detects AMP variants of a page
//
// A URL is AMP when:
// - its lower-cased path contains "/amp" anywhere
//   (/amp/page, /article/amp.html, /amp-stories/x, /news/amphtml/1)
// - or it carries a query parameter named exactly "amp"
fn is_amp(url: &Url) -> bool {
    let in_path = url.path().to_ascii_lowercase().contains("/amp");
    in_path || url.query_pairs().any(|(key, _)| key == "amp")
}

// src/urls/links.rs
// =============================================================================
// This module extracts link targets from HTML pages.
//
// The scan is a tolerant regex over `href="..."` / `href='...'` attributes,
// not a DOM parse. It can over-match (an href inside a comment or a <link>
// tag) or under-match (unquoted attributes); both are accepted. Anything
// that should not be crawled is filtered later by the normalizer.
// =============================================================================

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;
use url::Url;

// Targets that never lead to a page
const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

fn href_pattern() -> &'static Regex {
    static HREF: OnceLock<Regex> = OnceLock::new();
    // The pattern is a constant, so a failure here is a programmer error
    HREF.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*(?:"([^"\r\n]*)"|'([^'\r\n]*)')"#).unwrap()
    })
}

// Extracts every href target from HTML content
//
// Parameters:
//   html: the HTML content to scan (borrowed as &str)
//   base_url: the URL of the page (for resolving relative links)
//
// Returns: absolute URLs in document order, duplicates included
//
// Example:
//   html = "<a href='/docs'>Docs</a>"
//   base_url = "https://example.com"
//   result = ["https://example.com/docs"]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(base_url, error = %e, "invalid base URL, no links extracted");
            return Vec::new();
        }
    };

    href_pattern()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| resolve_href(&base, m.as_str()))
        .collect()
}

// Resolves one href against the page URL
//
// Returns None for empty values, skipped schemes, and values that do not
// form a valid URL.
fn resolve_href(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }

    let lowered = href.trim_start().to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    // join() handles both absolute and relative forms
    base.join(href).ok().map(|url| url.to_string())
}

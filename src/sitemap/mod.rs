// src/sitemap/mod.rs
// =============================================================================
// Sitemap output.
//
// SitemapEntry is what the crawl engine records for every HTML page it
// maps; the writer turns the ordered list of entries into a <urlset> file,
// or into numbered chunk files plus a <sitemapindex> when the list is
// larger than one file may hold.
// =============================================================================

mod writer;

pub use writer::{write_sitemaps, WrittenSitemaps};

/// One `<url>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Canonical absolute URL
    pub loc: String,
    /// 0.0..=1.0, rendered with one decimal
    pub priority: f64,
    /// ISO-8601 timestamp, written verbatim
    pub lastmod: Option<String>,
}

impl SitemapEntry {
    pub fn new(loc: impl Into<String>, priority: f64) -> Self {
        Self {
            loc: loc.into(),
            priority,
            lastmod: None,
        }
    }

    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }
}

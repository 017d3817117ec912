// src/error.rs
// =============================================================================
// Error types for every layer of the crawler.
//
// Each layer gets its own enum so callers can tell a bad config file apart
// from an unreachable seed or a sitemap that could not be written. The
// binary (main.rs) wraps all of them in anyhow for reporting.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Failure to fetch or render a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level HTTP failure (DNS, connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A redirect or request target could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The headless browser failed to launch, navigate or read the page
    #[error("render error: {0}")]
    Render(String),

    /// The page did not finish loading in time
    #[error("timed out loading {url}")]
    Timeout { url: String },
}

/// Failure while writing sitemap files.
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("failed to write sitemap {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sitemap base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Invalid or unreadable crawl configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no base URL given (pass one on the command line or set baseUrl in the config file)")]
    MissingBaseUrl,

    #[error("base URL must use http or https: {0}")]
    UnsupportedScheme(String),

    #[error("invalid ignore pattern: {0}")]
    InvalidIgnorePattern(#[from] regex::Error),

    #[error("maxEntriesPerFile must be at least 1")]
    InvalidMaxEntries,

    #[error("priority {0} is outside 0.0..=1.0")]
    InvalidPriority(f64),

    #[error("unknown waitUntil policy '{0}' (expected load, domcontentloaded or networkidle)")]
    InvalidWaitUntil(String),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Unrecoverable crawl failure. Everything per-URL is reported as an event
/// instead and never reaches this type.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("renderer unavailable: {0}")]
    RendererUnavailable(#[source] FetchError),

    #[error("seed URL {url} is unreachable: {source}")]
    SeedUnreachable {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Sitemap(#[from] SitemapError),

    #[error("crawl cancelled")]
    Cancelled,
}

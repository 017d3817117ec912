// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling from a seed URL with a FIFO frontier
// - Same-origin restriction, asset/AMP filtering and optional query stripping
// - robots.txt disallow rules and a user-supplied ignore rule
// - Depth limit with per-depth sitemap priorities
// - Sitemap output (chunked with an index for large sites)
//
// Observers learn what happened through CrawlEvent values sent on an
// unbounded channel; the engine runs the same with or without a listener.
// =============================================================================

mod engine;
mod state;

pub use engine::{CrawlEngine, CrawlSummary};
use state::CrawlState;

/// Details of a failed page or a fatal crawl error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlIssue {
    /// HTTP status when the failure came from a response
    pub code: Option<u16>,
    pub message: String,
    pub url: Option<String>,
}

/// Something observers may want to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// A page was added to the sitemap
    Add(String),
    /// A URL was skipped by robots.txt or the ignore rule
    Ignore(String),
    /// A page returned an HTTP error, or the crawl failed
    Error(CrawlIssue),
    /// The sitemap was written
    Done,
}

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    LoadingRobots,
    Crawling,
    WritingSitemap,
    Done,
    Cancelled,
    Errored,
}

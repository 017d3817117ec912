// src/crawl/state.rs
// =============================================================================
// Mutable state of one crawl.
//
// Everything that changes while crawling lives here and is owned by a single
// CrawlState, passed by &mut through the traversal loop. Two crawls never
// share one, so independent crawls can run side by side in one process.
// =============================================================================

use std::collections::{HashSet, VecDeque};

use crate::sitemap::SitemapEntry;

// Represents a page in the crawl queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    /// Link hops from the seed; children are always parent + 1
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct CrawlState {
    /// FIFO queue of targets still to process
    pub frontier: VecDeque<CrawlTarget>,
    /// Canonical URLs already processed or ignored; only ever grows
    pub visited: HashSet<String>,
    /// Sitemap entries in discovery order
    pub entries: Vec<SitemapEntry>,
}

impl CrawlState {
    pub fn new(seed: impl Into<String>) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back(CrawlTarget {
            url: seed.into(),
            depth: 0,
        });
        Self {
            frontier,
            ..Self::default()
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Returns false if the URL was already visited.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn enqueue(&mut self, url: String, depth: usize) {
        self.frontier.push_back(CrawlTarget { url, depth });
    }
}

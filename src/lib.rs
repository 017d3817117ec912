// src/lib.rs
// =============================================================================
// Library side of sitemap-crawler.
//
// The binary (main.rs) is one user of these modules. Anything that wants to
// embed a crawl can build CrawlOptions, pick its fetchers, listen to the
// event channel and hold the abort handle itself.
//
// Modules:
// - config:  crawl options, builder and JSON config file
// - crawl:   the breadth-first engine, its events and phases
// - error:   error types for every layer
// - fetch:   Fetcher trait, plain HTTP fetcher and headless renderer
// - robots:  robots.txt disallow rules
// - sitemap: sitemap and sitemap index writer
// - urls:    link extraction and URL normalization
// =============================================================================

pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod robots;
pub mod sitemap;
pub mod urls;

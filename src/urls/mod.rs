// src/urls/mod.rs
// =============================================================================
// URL handling for the crawler.
//
// Submodules:
// - links: pulls href targets out of raw HTML
// - normalize: turns any discovered URL into its canonical form, or drops it
// =============================================================================

mod links;
mod normalize;

pub use links::extract_links;
pub use normalize::UrlNormalizer;

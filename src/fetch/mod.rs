// src/fetch/mod.rs
// =============================================================================
// Page fetching.
//
// The crawl engine never talks to the network directly. It goes through the
// Fetcher trait, which has two implementations:
// - http: a plain reqwest GET that follows up to 5 redirects by hand
// - render: a headless Chromium page load, so script-inserted links are seen
//
// Tests swap in an in-memory Fetcher instead.
// =============================================================================

mod http;
mod render;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FetchError;

pub use http::HttpFetcher;
pub use render::Renderer;

/// What a fetch produced, whatever the status code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status_code: u16,
    pub status_message: String,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    pub fn is_html(&self) -> bool {
        is_html(self.header("content-type"))
    }
}

/// True when a Content-Type value names an HTML document.
pub fn is_html(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|value| value.to_ascii_lowercase().contains("text/html"))
}

/// Source of page contents for the crawl engine.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Acquire any heavyweight resources. Called once before the crawl.
    async fn start(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Fetch one URL. Only transport failures are errors; HTTP error
    /// statuses come back as a normal response.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;

    /// Release whatever start() acquired. Called exactly once at crawl end.
    async fn shutdown(&self) {}
}

// src/fetch/http.rs
// =============================================================================
// This module fetches pages over plain HTTP.
//
// Key functionality:
// - GET requests through one shared reqwest Client (connection pooling)
// - Redirects followed by hand, at most MAX_REDIRECTS hops; past the cap
//   the last redirect response is returned as-is instead of looping
// - HTTP error statuses are returned as responses, not errors; only
//   transport failures (DNS, connect, timeout, TLS) are errors
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, Response};
use tracing::debug;
use url::Url;

use super::{FetchResponse, Fetcher};
use crate::error::FetchError;

pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    // Creates the fetcher and its HTTP client
    //
    // Parameters:
    //   user_agent: sent with every request
    //   timeout: per-request timeout, covering connect and body
    //
    // The client is built once and reused for every request (connection pooling)
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        // reqwest must not follow redirects itself, we count the hops
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    // GETs a URL, following redirects by hand
    //
    // Parameters:
    //   url: absolute URL to fetch
    //
    // Returns: the final response (any status), or an error for transport
    //          failures and unparseable URLs
    //
    // Example:
    //   /old -> 301 -> /new -> 200   returns the 200 from /new
    //   six redirects in a row        returns the 6th 3xx response as-is
    pub async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let mut current = Url::parse(url)?;
        let mut hops = 0;

        loop {
            // Send the request; only transport failures are errors here
            let response = self.client.get(current.clone()).send().await?;

            // A 3xx with a usable Location is followed while under the cap.
            // Relative Locations resolve against the URL that redirected.
            let next = if response.status().is_redirection() && hops < MAX_REDIRECTS {
                response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| current.join(location).ok())
            } else {
                None
            };

            match next {
                // Go round again with the redirect target
                Some(next) => {
                    hops += 1;
                    debug!(from = %current, to = %next, hops, "following redirect");
                    current = next;
                }
                // Anything else is the answer, error statuses included
                None => return into_fetch_response(response).await,
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.get(url).await
    }
}

// Converts a reqwest response into our FetchResponse, reading the body
async fn into_fetch_response(response: Response) -> Result<FetchResponse, FetchError> {
    let status = response.status();

    // HeaderName is always lower-case; repeated headers are comma-joined
    let mut headers: HashMap<String, String> = HashMap::new();
    for (name, value) in response.headers() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    let body = response.text().await?;

    Ok(FetchResponse {
        status_code: status.as_u16(),
        status_message: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body,
    })
}

// src/fetch/render.rs
// =============================================================================
// This module fetches pages through a headless Chromium browser.
//
// Pages that build their navigation with JavaScript have no useful hrefs
// in the raw HTML, so the crawler can load them in a real browser and read
// back the rendered DOM instead.
//
// Lifecycle:
// - the browser is launched on first need (start() or the first fetch)
// - every fetch opens a fresh tab and closes it when done
// - shutdown() closes the browser; it is called exactly once at crawl end
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{FetchResponse, Fetcher};
use crate::config::{RenderOptions, WaitUntil};
use crate::error::FetchError;

// Extra quiet time granted after `load` for the networkidle policy
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);

// Runs in the page; returns how many nodes it touched
const EXPAND_SCRIPT: &str = r#"(opts) => {
  let touched = 0;
  const click = (node) => {
    try {
      if (typeof node.click === 'function') { node.click(); touched++; return true; }
    } catch (e) {}
    return false;
  };
  if (opts.expandAllDetails) {
    document.querySelectorAll('details:not([open])').forEach((node) => {
      node.setAttribute('open', '');
      touched++;
    });
  }
  if (opts.expandAria) {
    document.querySelectorAll('[aria-expanded="false"]').forEach((node) => {
      if (!click(node)) { node.setAttribute('aria-expanded', 'true'); touched++; }
    });
  }
  (opts.expandSelectors || []).forEach((selector) => {
    try { document.querySelectorAll(selector).forEach(click); } catch (e) {}
  });
  return touched;
}"#;

struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

pub struct Renderer {
    options: RenderOptions,
    user_agent: String,
    browser: Mutex<Option<LaunchedBrowser>>,
}

impl Renderer {
    /// `default_user_agent` is used unless the render options carry their own.
    pub fn new(options: RenderOptions, default_user_agent: &str) -> Self {
        let user_agent = options
            .user_agent
            .clone()
            .unwrap_or_else(|| default_user_agent.to_string());
        Self {
            options,
            user_agent,
            browser: Mutex::new(None),
        }
    }

    async fn launch() -> Result<LaunchedBrowser, FetchError> {
        let config = BrowserConfig::builder().build().map_err(FetchError::Render)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(render_error)?;

        // The browser only makes progress while its handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("headless browser launched");
        Ok(LaunchedBrowser { browser, handler })
    }

    async fn new_page(&self) -> Result<Page, FetchError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(Self::launch().await?);
        }
        let Some(launched) = guard.as_ref() else {
            return Err(FetchError::Render("browser is not running".to_string()));
        };
        launched
            .browser
            .new_page("about:blank")
            .await
            .map_err(render_error)
    }

    pub async fn render(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let page = self.new_page().await?;
        let result = self.load(&page, url).await;
        if let Err(e) = page.close().await {
            debug!(url, error = %e, "failed to close tab");
        }
        result
    }

    async fn load(&self, page: &Page, url: &str) -> Result<FetchResponse, FetchError> {
        page.set_user_agent(self.user_agent.as_str())
            .await
            .map_err(render_error)?;

        let navigation = tokio::time::timeout(self.options.timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation_response().await
        })
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
        })?
        .map_err(render_error)?;

        if self.options.wait_until == WaitUntil::NetworkIdle {
            tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
        }

        if self.options.wants_expansion() {
            let script = expansion_script(&self.options);
            match page.evaluate(script.as_str()).await {
                Ok(_) => debug!(url, "expanded collapsed content"),
                Err(e) => debug!(url, error = %e, "content expansion failed"),
            }
        }
        if let Some(wait) = self.options.expand_wait {
            tokio::time::sleep(wait).await;
        }

        let (status_code, status_message, headers) = match navigation
            .as_ref()
            .and_then(|request| request.response.as_ref())
        {
            Some(response) => (
                u16::try_from(response.status).unwrap_or(0),
                response.status_text.clone(),
                lowercase_headers(response.headers.inner()),
            ),
            None => (0, String::new(), HashMap::new()),
        };

        let body = page.content().await.map_err(render_error)?;

        Ok(FetchResponse {
            status_code,
            status_message,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for Renderer {
    async fn start(&self) -> Result<(), FetchError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(Self::launch().await?);
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.render(url).await
    }

    async fn shutdown(&self) {
        let Some(mut launched) = self.browser.lock().await.take() else {
            return;
        };
        if let Err(e) = launched.browser.close().await {
            warn!(error = %e, "failed to close headless browser");
        }
        if let Err(e) = launched.browser.wait().await {
            debug!(error = %e, "headless browser did not exit cleanly");
        }
        launched.handler.abort();
        info!("headless browser closed");
    }
}

fn render_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::Render(e.to_string())
}

fn expansion_script(options: &RenderOptions) -> String {
    let payload = json!({
        "expandAllDetails": options.expand_all_details,
        "expandAria": options.expand_aria,
        "expandSelectors": options.expand_selectors,
    });
    format!("({EXPAND_SCRIPT})({payload})")
}

// CDP reports headers as a JSON object with original-case names
fn lowercase_headers(raw: &Value) -> HashMap<String, String> {
    let Some(object) = raw.as_object() else {
        return HashMap::new();
    };
    object
        .iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((name.to_ascii_lowercase(), value))
        })
        .collect()
}

// src/crawl/engine.rs
// =============================================================================
// This module implements the crawl itself.
//
// How it works:
// 1. Start the page fetcher (launches the headless browser if rendering)
// 2. Load robots.txt from the seed's origin; any failure means "no rules"
// 3. Put the seed in a FIFO queue at depth 0
// 4. Pop a URL, normalize it, skip it if seen, ignore it if robots or the
//    ignore rule say so, otherwise fetch it
// 5. Record HTML pages as sitemap entries and queue their unseen links at
//    depth + 1, unless the page is already at max depth
// 6. Repeat until the queue is empty, then write the sitemap
//
// Whatever happens, the page fetcher is shut down before run() returns.
//
// Only three things abort a crawl: the renderer failing to start, the seed
// being unreachable, and the sitemap failing to write. Everything else is
// per-URL and reported through events.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, warn};

use super::{CrawlEvent, CrawlIssue, CrawlPhase, CrawlState};
use crate::config::CrawlOptions;
use crate::error::CrawlError;
use crate::fetch::{FetchResponse, Fetcher};
use crate::robots::DisallowRules;
use crate::sitemap::{write_sitemaps, SitemapEntry, WrittenSitemaps};
use crate::urls::{extract_links, UrlNormalizer};

/// Result of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub entries: Vec<SitemapEntry>,
    /// Distinct canonical URLs dequeued (fetched or ignored)
    pub visited: usize,
    pub files: WrittenSitemaps,
}

pub struct CrawlEngine {
    options: CrawlOptions,
    normalizer: UrlNormalizer,
    robots_fetcher: Arc<dyn Fetcher>,
    page_fetcher: Arc<dyn Fetcher>,
    events: Option<UnboundedSender<CrawlEvent>>,
    abort: Arc<AtomicBool>,
    phase: CrawlPhase,
}

impl CrawlEngine {
    /// `robots_fetcher` loads robots.txt; `page_fetcher` loads pages and
    /// may be the same fetcher or a renderer.
    pub fn new(
        options: CrawlOptions,
        robots_fetcher: Arc<dyn Fetcher>,
        page_fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            normalizer: UrlNormalizer::new(&options),
            options,
            robots_fetcher,
            page_fetcher,
            events: None,
            abort: Arc::new(AtomicBool::new(false)),
            phase: CrawlPhase::Idle,
        }
    }

    /// Send events to `tx`. A dropped receiver is not an error.
    pub fn with_events(mut self, tx: UnboundedSender<CrawlEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Flag that stops the crawl before the next URL is dequeued.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Run the crawl to completion. Consumes the engine so the page
    /// fetcher is shut down exactly once.
    #[instrument(skip(self), fields(seed = %self.options.base_url))]
    pub async fn run(mut self) -> Result<CrawlSummary, CrawlError> {
        let result = self.run_phases().await;

        // Cleanup runs on every path: done, failed or cancelled
        self.page_fetcher.shutdown().await;

        // Record how it ended and tell the listener
        match &result {
            Ok(summary) => {
                self.set_phase(CrawlPhase::Done);
                info!(
                    pages = summary.entries.len(),
                    visited = summary.visited,
                    "crawl complete"
                );
                self.emit(CrawlEvent::Done);
            }
            // Cancellation was asked for, so it is not reported as an error
            Err(CrawlError::Cancelled) => {
                self.set_phase(CrawlPhase::Cancelled);
                warn!("crawl cancelled, sitemap not written");
            }
            Err(e) => {
                self.set_phase(CrawlPhase::Errored);
                error!(error = %e, "crawl failed");
                let url = match e {
                    CrawlError::SeedUnreachable { url, .. } => Some(url.clone()),
                    _ => None,
                };
                self.emit(CrawlEvent::Error(CrawlIssue {
                    code: None,
                    message: e.to_string(),
                    url,
                }));
            }
        }

        result
    }

    // Runs the phases in order: start, robots, crawl, write
    async fn run_phases(&mut self) -> Result<CrawlSummary, CrawlError> {
        // Launch the browser up front so a missing Chromium fails fast
        if self.options.render_with_js() {
            self.page_fetcher
                .start()
                .await
                .map_err(CrawlError::RendererUnavailable)?;
        }

        self.set_phase(CrawlPhase::LoadingRobots);
        let rules = self.load_robots().await;

        // The seed goes in at depth 0
        self.set_phase(CrawlPhase::Crawling);
        let mut state = CrawlState::new(self.options.base_url.as_str());
        self.crawl(&mut state, &rules).await?;

        // Only a finished crawl gets a sitemap
        self.set_phase(CrawlPhase::WritingSitemap);
        let files = write_sitemaps(
            &state.entries,
            &self.options.filepath,
            self.options.max_entries_per_file,
            &self.options.base_url,
            self.options.last_mod,
        )?;

        Ok(CrawlSummary {
            visited: state.visited.len(),
            entries: state.entries,
            files,
        })
    }

    // Loads robots.txt from the seed's origin
    //
    // Always uses the plain HTTP fetcher, even when pages are rendered.
    //
    // Returns: the disallow rules for "*"; empty when robots.txt is
    //          missing, returns an error status, or cannot be fetched
    async fn load_robots(&self) -> DisallowRules {
        // robots.txt always lives at the root of the origin
        let robots_url = match self.options.base_url.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "cannot build robots.txt URL");
                return DisallowRules::default();
            }
        };

        match self.robots_fetcher.fetch(robots_url.as_str()).await {
            // Got a robots.txt: parse it
            Ok(response) if !response.is_error() => {
                let rules = DisallowRules::parse(&response.body);
                info!(url = %robots_url, rules = rules.len(), "robots.txt loaded");
                debug!(disallow = ?rules.rules(), "robots.txt rules for *");
                rules
            }
            // 404 and friends: the site has no rules for us
            Ok(response) => {
                debug!(url = %robots_url, status = response.status_code, "no robots.txt");
                DisallowRules::default()
            }
            // Network trouble is not worth failing the crawl over
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt unavailable, crawling unrestricted");
                DisallowRules::default()
            }
        }
    }

    // Breadth-first traversal from the seed
    //
    // Parameters:
    //   state: frontier, visited set and entries; the seed is already queued
    //   rules: robots.txt disallow rules loaded at startup
    //
    // Returns: Ok(()) once the frontier is empty, or an error when the crawl
    //          was cancelled or the seed could not be fetched
    //
    // Example (max_depth = 1):
    //   "/" (depth 0) is fetched and its links queued at depth 1
    //   "/about" (depth 1) is fetched, but its links are not queued
    async fn crawl(&self, state: &mut CrawlState, rules: &DisallowRules) -> Result<(), CrawlError> {
        // Process the frontier until empty (FIFO = breadth-first)
        while let Some(target) = state.frontier.pop_front() {
            // Stop before touching the next URL once abort is requested
            if self.abort.load(Ordering::Relaxed) {
                return Err(CrawlError::Cancelled);
            }

            // Step 1: canonical form; links that normalize to nothing are dropped
            let Some(url) = self.normalizer.normalize(&target.url) else {
                continue;
            };

            // Step 2: skip anything already processed
            if state.is_visited(&url) {
                continue;
            }

            // Step 3: the ignore rule and robots.txt both count as "ignored"
            if self.options.is_ignored(&url) || rules.is_disallowed(&url) {
                state.mark_visited(&url);
                debug!(url = %url, "ignored");
                self.emit(CrawlEvent::Ignore(url));
                continue;
            }

            // Step 4: mark as visited before the fetch so nothing queues it again
            state.mark_visited(&url);

            // Step 5: fetch the page (raw HTTP or rendered)
            debug!(url = %url, depth = target.depth, "fetching");
            let response = match self.page_fetcher.fetch(&url).await {
                Ok(response) => response,
                // Without the seed there is nothing to crawl
                Err(source) if target.depth == 0 => {
                    return Err(CrawlError::SeedUnreachable { url, source });
                }
                // Any other page: log it and move on
                Err(e) => {
                    warn!(url = %url, error = %e, "fetch failed, skipping");
                    continue;
                }
            };

            // Step 6: HTTP errors are reported, and the page is not expanded
            if response.is_error() {
                debug!(url = %url, status = response.status_code, "page error");
                self.emit(CrawlEvent::Error(CrawlIssue {
                    code: Some(response.status_code),
                    message: response.status_message.clone(),
                    url: Some(url),
                }));
                continue;
            }

            // Step 7: only HTML pages go in the sitemap
            if !response.is_html() {
                debug!(url = %url, content_type = ?response.header("content-type"), "not HTML, skipping");
                continue;
            }

            // Step 8: record the page
            state.entries.push(self.build_entry(&url, target.depth, &response));
            self.emit(CrawlEvent::Add(url.clone()));

            // Step 9: pages at max depth are leaves
            if target.depth >= self.options.max_depth {
                continue;
            }

            // Step 10: queue every unseen link one level deeper
            let mut queued = 0;
            for link in extract_links(&response.body, &url) {
                let Some(child) = self.normalizer.normalize(&link) else {
                    continue;
                };
                // Only add if not visited
                if state.is_visited(&child) {
                    continue;
                }
                state.enqueue(child, target.depth + 1);
                queued += 1;
            }
            debug!(url = %url, queued, "links queued");
        }

        Ok(())
    }

    // Builds the sitemap entry for a crawled page
    //
    // Parameters:
    //   url: canonical URL of the page
    //   depth: link hops from the seed, picks the priority
    //   response: the page response, for its Last-Modified header
    //
    // Returns: SitemapEntry with priority and (if enabled and parseable) lastmod
    fn build_entry(&self, url: &str, depth: usize, response: &FetchResponse) -> SitemapEntry {
        let entry = SitemapEntry::new(url, self.options.priority_for_depth(depth));

        // lastmod is optional in the sitemap protocol, skip it when disabled
        if !self.options.last_mod {
            return entry;
        }

        // An unparseable date is left out rather than written verbatim
        match response.header("last-modified").and_then(format_last_modified) {
            Some(lastmod) => entry.with_lastmod(lastmod),
            None => entry,
        }
    }

    fn set_phase(&mut self, phase: CrawlPhase) {
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    // A closed or missing listener is fine
    fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

// HTTP-date layouts left once the weekday is stripped, all in GMT
const HTTP_DATE_FORMATS: &[&str] = &[
    // IMF-fixdate: "01 Jan 2024 00:00:00 GMT"
    "%d %b %Y %H:%M:%S GMT",
    // RFC 850: "01-Jan-24 00:00:00 GMT"
    "%d-%b-%y %H:%M:%S GMT",
    // asctime: "Jan  1 00:00:00 2024"
    "%b %e %H:%M:%S %Y",
];

// Reformats a Last-Modified header as ISO-8601 UTC with milliseconds
//
// Accepts RFC 2822, RFC 3339, RFC 850 and asctime dates. A weekday that
// does not match the date is ignored.
//
// Example:
//   "Mon, 01 Jan 2024 00:00:00 GMT" -> "2024-01-01T00:00:00.000Z"
fn format_last_modified(value: &str) -> Option<String> {
    let parsed = parse_http_date(value.trim())?;
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    // The strict forms first
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    // Then without the weekday, which chrono would check against the date
    let rest = strip_weekday(value);
    if let Ok(date) = DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z") {
        return Some(date.with_timezone(&Utc));
    }
    HTTP_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(rest, format).ok())
        .map(|naive| naive.and_utc())
}

// "Tue, 01 Jan ..." -> "01 Jan ...", "Mon Jan  1 ..." -> "Jan  1 ..."
fn strip_weekday(value: &str) -> &str {
    match value.split_once([',', ' ']) {
        Some((head, rest)) if !head.is_empty() && head.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoreRule;
    use crate::error::FetchError;
    use crate::fetch::HttpFetcher;
    use async_trait::async_trait;
    use mockito::Server;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc;

    // In-memory website. Unknown URLs answer 404.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, Result<FetchResponse, String>>,
        fetched: Mutex<Vec<String>>,
        shutdowns: AtomicUsize,
        fail_start: bool,
    }

    impl FakeSite {
        fn page(mut self, url: &str, response: FetchResponse) -> Self {
            self.pages.insert(url.to_string(), Ok(response));
            self
        }

        fn broken(mut self, url: &str) -> Self {
            self.pages.insert(url.to_string(), Err("connection refused".to_string()));
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeSite {
        async fn start(&self) -> Result<(), FetchError> {
            if self.fail_start {
                return Err(FetchError::Render("no browser".to_string()));
            }
            Ok(())
        }

        async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
            self.fetched.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(FetchError::Render(message.clone())),
                None => Ok(response(404, "text/html", "")),
            }
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn response(status: u16, content_type: &str, body: &str) -> FetchResponse {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        FetchResponse {
            status_code: status,
            status_message: if status == 404 { "Not Found" } else { "OK" }.to_string(),
            headers,
            body: body.to_string(),
        }
    }

    fn html(links: &[&str]) -> FetchResponse {
        let body: String = links
            .iter()
            .map(|href| format!(r#"<a href="{href}">link</a>"#))
            .collect();
        response(200, "text/html; charset=utf-8", &body)
    }

    fn options(dir: &Path, max_depth: usize) -> crate::config::CrawlOptionsBuilder {
        CrawlOptions::builder("https://example.com")
            .max_depth(max_depth)
            .filepath(dir.join("sitemap.xml"))
    }

    fn no_robots() -> Arc<FakeSite> {
        Arc::new(FakeSite::default())
    }

    async fn run(
        options: CrawlOptions,
        robots: Arc<FakeSite>,
        site: Arc<FakeSite>,
    ) -> (Result<CrawlSummary, CrawlError>, Vec<CrawlEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = CrawlEngine::new(options, robots, site).with_events(tx).run().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (result, events)
    }

    fn locs(summary: &CrawlSummary) -> Vec<&str> {
        summary.entries.iter().map(|e| e.loc.as_str()).collect()
    }

    fn tmp() -> TempDir {
        tempdir().unwrap()
    }

    #[tokio::test]
    async fn test_assets_are_never_queued() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/about", "/style.css"]))
                .page("https://example.com/about", html(&[])),
        );

        let (result, events) = run(options(dir.path(), 1).build().unwrap(), no_robots(), site.clone()).await;
        let summary = result.unwrap();

        assert_eq!(locs(&summary), vec!["https://example.com/", "https://example.com/about"]);
        assert_eq!(site.fetched(), vec!["https://example.com/", "https://example.com/about"]);
        assert_eq!(
            events,
            vec![
                CrawlEvent::Add("https://example.com/".to_string()),
                CrawlEvent::Add("https://example.com/about".to_string()),
                CrawlEvent::Done,
            ]
        );
        assert!(dir.path().join("sitemap.xml").exists());
    }

    #[tokio::test]
    async fn test_robots_disallowed_url_is_ignored_not_fetched() {
        let dir = tmp();
        let robots = Arc::new(FakeSite::default().page(
            "https://example.com/robots.txt",
            response(200, "text/plain", "User-agent: *\nDisallow: /private\n"),
        ));
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/private/page", "/public"]))
                .page("https://example.com/public", html(&[])),
        );

        let (result, events) = run(options(dir.path(), 2).build().unwrap(), robots, site.clone()).await;
        let summary = result.unwrap();

        assert!(events.contains(&CrawlEvent::Ignore("https://example.com/private/page".to_string())));
        assert!(!site.fetched().contains(&"https://example.com/private/page".to_string()));
        assert_eq!(locs(&summary), vec!["https://example.com/", "https://example.com/public"]);
        assert_eq!(summary.visited, 3);
    }

    #[tokio::test]
    async fn test_ignore_rule_marks_visited_and_emits_once() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/admin/panel", "/a"]))
                .page("https://example.com/a", html(&["/admin/panel"])),
        );
        let options = options(dir.path(), 3)
            .ignore(IgnoreRule::predicate(|url| url.contains("/admin/")))
            .build()
            .unwrap();

        let (result, events) = run(options, no_robots(), site.clone()).await;
        result.unwrap();

        let ignores = events
            .iter()
            .filter(|e| matches!(e, CrawlEvent::Ignore(_)))
            .count();
        assert_eq!(ignores, 1);
        assert!(!site.fetched().iter().any(|u| u.contains("/admin/")));
    }

    #[tokio::test]
    async fn test_breadth_first_order() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/a", "/b"]))
                .page("https://example.com/a", html(&["/c"]))
                .page("https://example.com/b", html(&["/d"]))
                .page("https://example.com/c", html(&["/e"]))
                .page("https://example.com/d", html(&[])),
        );

        let (result, _) = run(options(dir.path(), 2).build().unwrap(), no_robots(), site.clone()).await;
        let summary = result.unwrap();

        assert_eq!(
            locs(&summary),
            vec![
                "https://example.com/",
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/c",
                "https://example.com/d",
            ]
        );
        // /c sits at max depth, so /e is never reached
        assert!(!site.fetched().contains(&"https://example.com/e".to_string()));
    }

    #[tokio::test]
    async fn test_no_url_is_fetched_twice() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/a", "/b", "/a#top", "/"]))
                .page("https://example.com/a", html(&["/b", "/", "/a"]))
                .page("https://example.com/b", html(&["/a", "/b?x=1"])),
        );

        let (result, _) = run(options(dir.path(), 5).build().unwrap(), no_robots(), site.clone()).await;
        let summary = result.unwrap();

        let fetched = site.fetched();
        let mut distinct = fetched.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(fetched.len(), distinct.len());
        assert_eq!(fetched.len(), 3);
        assert_eq!(summary.visited, 3);
        assert_eq!(summary.entries.len(), 3);
    }

    #[tokio::test]
    async fn test_error_status_is_reported_and_not_expanded() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/gone", "/ok"]))
                .page("https://example.com/gone", response(404, "text/html", r#"<a href="/hidden">x</a>"#))
                .page("https://example.com/ok", html(&[])),
        );

        let (result, events) = run(options(dir.path(), 3).build().unwrap(), no_robots(), site.clone()).await;
        let summary = result.unwrap();

        assert!(events.contains(&CrawlEvent::Error(CrawlIssue {
            code: Some(404),
            message: "Not Found".to_string(),
            url: Some("https://example.com/gone".to_string()),
        })));
        assert_eq!(locs(&summary), vec!["https://example.com/", "https://example.com/ok"]);
        assert!(!site.fetched().contains(&"https://example.com/hidden".to_string()));
        assert_eq!(events.last(), Some(&CrawlEvent::Done));
    }

    #[tokio::test]
    async fn test_non_html_is_skipped_silently() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/feed"]))
                .page("https://example.com/feed", response(200, "application/rss+xml", "<rss/>")),
        );

        let (result, events) = run(options(dir.path(), 2).build().unwrap(), no_robots(), site.clone()).await;
        let summary = result.unwrap();

        assert_eq!(locs(&summary), vec!["https://example.com/"]);
        assert!(site.fetched().contains(&"https://example.com/feed".to_string()));
        assert_eq!(
            events,
            vec![CrawlEvent::Add("https://example.com/".to_string()), CrawlEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_max_depth_zero_maps_only_the_seed() {
        let dir = tmp();
        let site = Arc::new(FakeSite::default().page("https://example.com/", html(&["/a"])));

        let (result, _) = run(options(dir.path(), 0).build().unwrap(), no_robots(), site.clone()).await;
        let summary = result.unwrap();

        assert_eq!(locs(&summary), vec!["https://example.com/"]);
        assert_eq!(site.fetched(), vec!["https://example.com/"]);
    }

    #[tokio::test]
    async fn test_priorities_follow_depth() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/a"]))
                .page("https://example.com/a", html(&["/b"]))
                .page("https://example.com/b", html(&[])),
        );
        let options = options(dir.path(), 5)
            .priority_map(vec![1.0, 0.8])
            .build()
            .unwrap();

        let (result, _) = run(options, no_robots(), site).await;
        let priorities: Vec<f64> = result.unwrap().entries.iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![1.0, 0.8, 0.8]);
    }

    #[tokio::test]
    async fn test_lastmod_from_header() {
        let dir = tmp();
        let mut page = html(&[]);
        page.headers.insert(
            "last-modified".to_string(),
            "Mon, 01 Jan 2024 00:00:00 GMT".to_string(),
        );
        let site = Arc::new(FakeSite::default().page("https://example.com/", page));

        let (result, _) = run(options(dir.path(), 0).build().unwrap(), no_robots(), site.clone()).await;
        assert_eq!(
            result.unwrap().entries[0].lastmod.as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );

        let dir = tmp();
        let options = options(dir.path(), 0).last_mod(false).build().unwrap();
        let (result, _) = run(options, no_robots(), site).await;
        assert_eq!(result.unwrap().entries[0].lastmod, None);
    }

    #[test]
    fn test_format_last_modified() {
        assert_eq!(
            format_last_modified("Mon, 01 Jan 2024 00:00:00 GMT").as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
        assert_eq!(
            format_last_modified("Tue, 02 Jan 2024 03:04:05 +0200").as_deref(),
            Some("2024-01-02T01:04:05.000Z")
        );
        assert_eq!(
            format_last_modified("2024-03-01T12:00:00Z").as_deref(),
            Some("2024-03-01T12:00:00.000Z")
        );
        assert_eq!(format_last_modified("invalid-date"), None);
        assert_eq!(format_last_modified("Mon Jan 99 00:00:00 2024"), None);
        assert_eq!(format_last_modified(""), None);
    }

    #[test]
    fn test_format_last_modified_obsolete_http_dates() {
        // RFC 850
        assert_eq!(
            format_last_modified("Monday, 01-Jan-24 00:00:00 GMT").as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
        // asctime, day padded with a space
        assert_eq!(
            format_last_modified("Mon Jan  1 00:00:00 2024").as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
        assert_eq!(
            format_last_modified("Wed Jan 10 08:30:00 2024").as_deref(),
            Some("2024-01-10T08:30:00.000Z")
        );
    }

    #[test]
    fn test_format_last_modified_ignores_wrong_weekday() {
        // 2024-01-01 was a Monday
        assert_eq!(
            format_last_modified("Tue, 01 Jan 2024 00:00:00 GMT").as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
        assert_eq!(
            format_last_modified("Fri, 01 Jan 2024 05:00:00 +0100").as_deref(),
            Some("2024-01-01T04:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_seed_transport_failure_is_fatal() {
        let dir = tmp();
        let site = Arc::new(FakeSite::default().broken("https://example.com/"));

        let (result, events) = run(options(dir.path(), 2).build().unwrap(), no_robots(), site.clone()).await;

        assert!(matches!(result, Err(CrawlError::SeedUnreachable { .. })));
        assert!(matches!(
            events.last(),
            Some(CrawlEvent::Error(CrawlIssue { code: None, url: Some(_), .. }))
        ));
        assert!(!events.contains(&CrawlEvent::Done));
        assert_eq!(site.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("sitemap.xml").exists());
    }

    #[tokio::test]
    async fn test_child_transport_failure_is_skipped() {
        let dir = tmp();
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/flaky", "/fine"]))
                .broken("https://example.com/flaky")
                .page("https://example.com/fine", html(&[])),
        );

        let (result, _) = run(options(dir.path(), 2).build().unwrap(), no_robots(), site).await;
        assert_eq!(
            locs(&result.unwrap()),
            vec!["https://example.com/", "https://example.com/fine"]
        );
    }

    #[tokio::test]
    async fn test_robots_failure_means_no_rules() {
        let dir = tmp();
        let robots = Arc::new(FakeSite::default().broken("https://example.com/robots.txt"));
        let site = Arc::new(
            FakeSite::default()
                .page("https://example.com/", html(&["/private"]))
                .page("https://example.com/private", html(&[])),
        );

        let (result, events) = run(options(dir.path(), 1).build().unwrap(), robots, site).await;
        assert_eq!(result.unwrap().entries.len(), 2);
        assert!(!events.iter().any(|e| matches!(e, CrawlEvent::Error(_) | CrawlEvent::Ignore(_))));
    }

    #[tokio::test]
    async fn test_sitemap_write_failure_is_fatal_and_cleans_up() {
        let dir = tmp();
        let site = Arc::new(FakeSite::default().page("https://example.com/", html(&[])));
        let options = CrawlOptions::builder("https://example.com")
            .filepath(dir.path().join("no-such-dir").join("sitemap.xml"))
            .build()
            .unwrap();

        let (result, events) = run(options, no_robots(), site.clone()).await;

        assert!(matches!(result, Err(CrawlError::Sitemap(_))));
        assert_eq!(
            events.first(),
            Some(&CrawlEvent::Add("https://example.com/".to_string()))
        );
        assert!(matches!(events.last(), Some(CrawlEvent::Error(_))));
        assert_eq!(site.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_renderer_start_failure_is_fatal() {
        let dir = tmp();
        let site = Arc::new(FakeSite {
            fail_start: true,
            ..FakeSite::default()
        });
        let options = options(dir.path(), 1).render_with_js(true).build().unwrap();

        let (result, _) = run(options, no_robots(), site.clone()).await;

        assert!(matches!(result, Err(CrawlError::RendererUnavailable(_))));
        assert!(site.fetched().is_empty());
        assert_eq!(site.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_stops_before_next_url() {
        let dir = tmp();
        let site = Arc::new(FakeSite::default().page("https://example.com/", html(&["/a"])));
        let engine = CrawlEngine::new(options(dir.path(), 2).build().unwrap(), no_robots(), site.clone());
        assert_eq!(engine.phase(), CrawlPhase::Idle);
        engine.abort_handle().store(true, Ordering::SeqCst);

        let result = engine.run().await;

        assert!(matches!(result, Err(CrawlError::Cancelled)));
        assert!(site.fetched().is_empty());
        assert_eq!(site.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("sitemap.xml").exists());
    }

    #[tokio::test]
    async fn test_runs_without_listener() {
        let dir = tmp();
        let site = Arc::new(FakeSite::default().page("https://example.com/", html(&[])));
        let engine = CrawlEngine::new(options(dir.path(), 0).build().unwrap(), no_robots(), site);
        assert_eq!(engine.run().await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_over_http() {
        let mut server = Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("User-agent: *\nDisallow: /private\n")
            .create_async()
            .await;
        let home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_header("last-modified", "Mon, 01 Jan 2024 00:00:00 GMT")
            .with_body(
                r#"<a href="/about">About</a>
                   <a href="/style.css">CSS</a>
                   <a href="/private/page">Secret</a>
                   <a href="https://elsewhere.example/">Away</a>"#,
            )
            .expect(1)
            .create_async()
            .await;
        let about = server
            .mock("GET", "/about")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<a href="/">Home</a>"#)
            .expect(1)
            .create_async()
            .await;
        let private = server
            .mock("GET", "/private/page")
            .expect(0)
            .create_async()
            .await;
        let css = server.mock("GET", "/style.css").expect(0).create_async().await;

        let dir = tmp();
        let path = dir.path().join("sitemap.xml");
        let options = CrawlOptions::builder(format!("{}/", server.url()))
            .max_depth(1)
            .priority_map(vec![1.0, 0.5])
            .filepath(&path)
            .build()
            .unwrap();
        let http: Arc<dyn Fetcher> =
            Arc::new(HttpFetcher::new(&options.user_agent, Duration::from_secs(5)).unwrap());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let summary = CrawlEngine::new(options, http.clone(), http)
            .with_events(tx)
            .run()
            .await
            .unwrap();

        let base = server.url();
        assert_eq!(
            locs(&summary),
            vec![format!("{base}/"), format!("{base}/about")]
        );

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&CrawlEvent::Ignore(format!("{base}/private/page"))));

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains(&format!("<loc>{base}/about</loc>")));
        assert!(xml.contains("<lastmod>2024-01-01T00:00:00.000Z</lastmod>"));
        assert!(xml.contains("<priority>0.5</priority>"));

        home.assert_async().await;
        about.assert_async().await;
        private.assert_async().await;
        css.assert_async().await;
    }
}

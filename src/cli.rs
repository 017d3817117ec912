// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every flag is optional on top of the config file, so a bare
// `sitemap-crawler https://example.com` crawls with the defaults from
// config.rs. Flags that switch a default off (--keep-querystring,
// --include-amp, --no-lastmod) only apply when given.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use sitemap_crawler::config::{CrawlOptions, CrawlOptionsBuilder, FileConfig, IgnoreRule, WaitUntil};
use sitemap_crawler::error::ConfigError;

#[derive(Parser, Debug)]
#[command(
    name = "sitemap-crawler",
    version,
    about = "Crawl a website breadth-first and write an XML sitemap",
    long_about = "sitemap-crawler follows same-origin links from a seed URL, honours robots.txt, \
                  and writes a sitemap.xml (split into several files plus an index for large sites)."
)]
pub struct Cli {
    /// Website to crawl (e.g., https://example.com)
    ///
    /// May be omitted when the config file sets baseUrl
    pub url: Option<String>,

    /// JSON config file; command-line flags override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Maximum link depth; 0 maps only the seed page
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Where to write the sitemap (default: ./sitemap.xml)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// URLs per sitemap file before splitting into an index
    #[arg(long)]
    pub max_entries_per_file: Option<usize>,

    /// Keep query strings instead of stripping them
    #[arg(long)]
    pub keep_querystring: bool,

    /// Keep AMP variants of pages
    #[arg(long)]
    pub include_amp: bool,

    /// Do not write <lastmod> from Last-Modified headers
    #[arg(long)]
    pub no_lastmod: bool,

    /// Priority per depth, comma separated (e.g., 1.0,0.8,0.5)
    #[arg(long, value_delimiter = ',')]
    pub priority_map: Option<Vec<f64>>,

    /// Skip URLs matching this regex (repeatable)
    #[arg(long = "ignore", value_name = "REGEX")]
    pub ignore: Vec<String>,

    /// User-Agent header for every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Treat paths ending in this extension as assets (repeatable, replaces the defaults)
    #[arg(long = "asset-ext", value_name = "EXT")]
    pub asset_extensions: Vec<String>,

    /// Treat paths under this prefix as assets (repeatable, replaces /_next/)
    #[arg(long = "asset-prefix", value_name = "PATH")]
    pub asset_path_prefixes: Vec<String>,

    /// Load pages in headless Chromium so JavaScript-built links are found
    #[arg(long)]
    pub render: bool,

    /// When a rendered page counts as loaded: load, domcontentloaded, networkidle
    #[arg(long)]
    pub wait_until: Option<String>,

    /// User-Agent inside the headless browser (default: --user-agent)
    #[arg(long)]
    pub render_user_agent: Option<String>,

    /// Page-load timeout for rendering, in milliseconds
    #[arg(long)]
    pub render_timeout_ms: Option<u64>,

    /// Open every <details> element before reading links
    #[arg(long)]
    pub expand_details: bool,

    /// Click every aria-expanded="false" element before reading links
    #[arg(long)]
    pub expand_aria: bool,

    /// Click elements matching this CSS selector (repeatable)
    #[arg(long = "expand-selector", value_name = "SELECTOR")]
    pub expand_selectors: Vec<String>,

    /// Wait this long after expanding, in milliseconds
    #[arg(long)]
    pub expand_wait_ms: Option<u64>,

    /// Debug-level logging (RUST_LOG overrides this)
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// Merge defaults, the config file and these flags into CrawlOptions.
    pub fn crawl_options(&self) -> Result<CrawlOptions, ConfigError> {
        let file = self.config.as_deref().map(FileConfig::load).transpose()?;

        let base_url = self
            .url
            .clone()
            .or_else(|| file.as_ref().and_then(|f| f.base_url.clone()))
            .ok_or(ConfigError::MissingBaseUrl)?;

        let mut builder = CrawlOptions::builder(base_url.as_str());
        if let Some(file) = file {
            builder = builder.apply_file(file)?;
        }
        self.apply_flags(builder.base_url(base_url))?.build()
    }

    fn apply_flags(&self, mut builder: CrawlOptionsBuilder) -> Result<CrawlOptionsBuilder, ConfigError> {
        if let Some(depth) = self.max_depth {
            builder = builder.max_depth(depth);
        }
        if let Some(path) = &self.output {
            builder = builder.filepath(path);
        }
        if let Some(max) = self.max_entries_per_file {
            builder = builder.max_entries_per_file(max);
        }
        if self.keep_querystring {
            builder = builder.strip_querystring(false);
        }
        if self.include_amp {
            builder = builder.ignore_amp(false);
        }
        if self.no_lastmod {
            builder = builder.last_mod(false);
        }
        if let Some(map) = &self.priority_map {
            builder = builder.priority_map(map.clone());
        }
        if !self.ignore.is_empty() {
            builder = builder.ignore(IgnoreRule::patterns(&self.ignore)?);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if !self.asset_extensions.is_empty() {
            builder = builder.asset_extensions(self.asset_extensions.clone());
        }
        if !self.asset_path_prefixes.is_empty() {
            builder = builder.asset_path_prefixes(self.asset_path_prefixes.clone());
        }

        // Rendering options only take effect together with --render
        if self.render {
            builder = builder.render_with_js(true);
        }
        if let Some(ua) = &self.render_user_agent {
            builder = builder.render_user_agent(ua);
        }
        if let Some(wait) = &self.wait_until {
            builder = builder.render_wait_until(wait.parse::<WaitUntil>()?);
        }
        if let Some(ms) = self.render_timeout_ms {
            builder = builder.render_timeout(Duration::from_millis(ms));
        }
        if self.expand_details {
            builder = builder.expand_all_details(true);
        }
        if self.expand_aria {
            builder = builder.expand_aria(true);
        }
        if !self.expand_selectors.is_empty() {
            builder = builder.expand_selectors(self.expand_selectors.clone());
        }
        if let Some(ms) = self.expand_wait_ms {
            builder = builder.expand_wait(Duration::from_millis(ms));
        }
        Ok(builder)
    }
}

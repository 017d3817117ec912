// src/config.rs
// =============================================================================
// Crawl configuration.
//
// CrawlOptions is fixed before a crawl starts and never changes afterwards.
// It is assembled with CrawlOptionsBuilder from three layers, lowest first:
//   1. built-in defaults
//   2. an optional JSON config file (camelCase keys, see FileConfig)
//   3. command-line flags
// build() validates the result once, so the engine never has to.
// =============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use regex::RegexSet;
use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// File extensions that never point at an HTML page.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    // stylesheets and scripts
    "css", "js", "mjs", "cjs", "map",
    // images
    "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp", "tif", "tiff",
    // media
    "mp4", "webm", "ogg", "ogv", "mp3", "wav", "flac", "m4a", "mov", "avi",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // archives
    "zip", "gz", "tgz", "tar", "rar", "7z", "bz2",
];

/// Build-output directories served by static site generators.
pub const DEFAULT_ASSET_PATH_PREFIXES: &[&str] = &["/_next/"];

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_ENTRIES_PER_FILE: usize = 50_000;
pub const DEFAULT_FILEPATH: &str = "./sitemap.xml";

/// Page-load policy for the headless renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The navigation has finished loading (`domcontentloaded` is an alias)
    Load,
    /// Load has fired and the network has gone quiet
    #[default]
    NetworkIdle,
}

impl FromStr for WaitUntil {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" | "domcontentloaded" => Ok(WaitUntil::Load),
            "networkidle" | "networkidle0" | "networkidle2" => Ok(WaitUntil::NetworkIdle),
            other => Err(ConfigError::InvalidWaitUntil(other.to_string())),
        }
    }
}

/// Options for JavaScript rendering.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
    /// Overrides the crawl-wide user agent inside the browser
    pub user_agent: Option<String>,
    /// Open every closed `<details>` element before reading the DOM
    pub expand_all_details: bool,
    /// Click every `[aria-expanded="false"]` element
    pub expand_aria: bool,
    /// Extra CSS selectors to click
    pub expand_selectors: Vec<String>,
    /// Pause after expansion so lazily inserted links can appear
    pub expand_wait: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::default(),
            timeout: Duration::from_secs(30),
            user_agent: None,
            expand_all_details: false,
            expand_aria: false,
            expand_selectors: Vec::new(),
            expand_wait: None,
        }
    }
}

impl RenderOptions {
    /// True when any DOM expansion hint is set.
    pub fn wants_expansion(&self) -> bool {
        self.expand_all_details || self.expand_aria || !self.expand_selectors.is_empty()
    }
}

/// User-supplied rule deciding which canonical URLs are skipped.
#[derive(Clone)]
pub enum IgnoreRule {
    /// Skip URLs matching any of these regular expressions
    Patterns(RegexSet),
    /// Skip URLs for which the closure returns true
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl IgnoreRule {
    pub fn patterns<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(IgnoreRule::Patterns(RegexSet::new(patterns)?))
    }

    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        IgnoreRule::Predicate(Arc::new(f))
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            IgnoreRule::Patterns(set) => set.is_match(url),
            IgnoreRule::Predicate(f) => f(url),
        }
    }
}

impl fmt::Debug for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreRule::Patterns(set) => f.debug_tuple("Patterns").field(&set.patterns()).finish(),
            IgnoreRule::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Immutable crawl configuration.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Seed URL; its origin is the crawl boundary
    pub base_url: Url,
    pub max_depth: usize,
    pub strip_querystring: bool,
    pub ignore_amp: bool,
    /// Record Last-Modified as `<lastmod>`
    pub last_mod: bool,
    /// Priority by depth; the last value covers deeper pages
    pub priority_map: Vec<f64>,
    pub ignore: Option<IgnoreRule>,
    pub filepath: PathBuf,
    pub max_entries_per_file: usize,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Lower-case extensions (no dot) treated as non-page assets
    pub asset_extensions: Vec<String>,
    /// Lower-case path prefixes treated as non-page assets
    pub asset_path_prefixes: Vec<String>,
    /// Some(..) when pages are fetched through the headless browser
    pub render: Option<RenderOptions>,
}

impl CrawlOptions {
    pub fn builder(base_url: impl Into<String>) -> CrawlOptionsBuilder {
        CrawlOptionsBuilder::new(base_url)
    }

    /// Priority for an entry found at `depth`.
    pub fn priority_for_depth(&self, depth: usize) -> f64 {
        self.priority_map
            .get(depth)
            .or_else(|| self.priority_map.last())
            .copied()
            .unwrap_or(0.5)
    }

    pub fn is_ignored(&self, url: &str) -> bool {
        self.ignore.as_ref().is_some_and(|rule| rule.matches(url))
    }

    pub fn render_with_js(&self) -> bool {
        self.render.is_some()
    }
}

/// Builder for CrawlOptions
#[derive(Debug, Clone)]
pub struct CrawlOptionsBuilder {
    base_url: String,
    max_depth: usize,
    strip_querystring: bool,
    ignore_amp: bool,
    last_mod: bool,
    priority_map: Vec<f64>,
    ignore: Option<IgnoreRule>,
    filepath: PathBuf,
    max_entries_per_file: usize,
    user_agent: String,
    request_timeout: Duration,
    asset_extensions: Vec<String>,
    asset_path_prefixes: Vec<String>,
    render_with_js: bool,
    render: RenderOptions,
}

impl CrawlOptionsBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            strip_querystring: true,
            ignore_amp: true,
            last_mod: true,
            priority_map: Vec::new(),
            ignore: None,
            filepath: PathBuf::from(DEFAULT_FILEPATH),
            max_entries_per_file: DEFAULT_MAX_ENTRIES_PER_FILE,
            user_agent: format!("sitemap-crawler/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(10),
            asset_extensions: DEFAULT_ASSET_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            asset_path_prefixes: DEFAULT_ASSET_PATH_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            render_with_js: false,
            render: RenderOptions::default(),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn strip_querystring(mut self, strip: bool) -> Self {
        self.strip_querystring = strip;
        self
    }

    pub fn ignore_amp(mut self, ignore: bool) -> Self {
        self.ignore_amp = ignore;
        self
    }

    pub fn last_mod(mut self, last_mod: bool) -> Self {
        self.last_mod = last_mod;
        self
    }

    pub fn priority_map(mut self, priority_map: Vec<f64>) -> Self {
        self.priority_map = priority_map;
        self
    }

    pub fn ignore(mut self, rule: IgnoreRule) -> Self {
        self.ignore = Some(rule);
        self
    }

    pub fn filepath(mut self, filepath: impl Into<PathBuf>) -> Self {
        self.filepath = filepath.into();
        self
    }

    pub fn max_entries_per_file(mut self, max: usize) -> Self {
        self.max_entries_per_file = max;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn asset_extensions(mut self, extensions: Vec<String>) -> Self {
        self.asset_extensions = extensions;
        self
    }

    pub fn asset_path_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.asset_path_prefixes = prefixes;
        self
    }

    pub fn render_with_js(mut self, enabled: bool) -> Self {
        self.render_with_js = enabled;
        self
    }

    pub fn render_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.render.wait_until = wait_until;
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.render.timeout = timeout;
        self
    }

    pub fn render_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.render.user_agent = Some(user_agent.into());
        self
    }

    pub fn expand_all_details(mut self, expand: bool) -> Self {
        self.render.expand_all_details = expand;
        self
    }

    pub fn expand_aria(mut self, expand: bool) -> Self {
        self.render.expand_aria = expand;
        self
    }

    pub fn expand_selectors(mut self, selectors: Vec<String>) -> Self {
        self.render.expand_selectors = selectors;
        self
    }

    pub fn expand_wait(mut self, wait: Duration) -> Self {
        self.render.expand_wait = Some(wait);
        self
    }

    /// Layer a parsed config file over the current values.
    pub fn apply_file(mut self, file: FileConfig) -> Result<Self, ConfigError> {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(depth) = file.max_depth {
            self.max_depth = depth;
        }
        if let Some(strip) = file.strip_querystring {
            self.strip_querystring = strip;
        }
        if let Some(amp) = file.ignore_amp {
            self.ignore_amp = amp;
        }
        if let Some(last_mod) = file.last_mod {
            self.last_mod = last_mod;
        }
        if let Some(map) = file.priority_map {
            self.priority_map = map;
        }
        if !file.ignore.is_empty() {
            self.ignore = Some(IgnoreRule::patterns(&file.ignore)?);
        }
        if let Some(path) = file.filepath {
            self.filepath = path;
        }
        if let Some(max) = file.max_entries_per_file {
            self.max_entries_per_file = max;
        }
        if let Some(ua) = file.user_agent {
            self.user_agent = ua;
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(exts) = file.asset_extensions {
            self.asset_extensions = exts;
        }
        if let Some(prefixes) = file.asset_path_prefixes {
            self.asset_path_prefixes = prefixes;
        }
        if let Some(render) = file.render_with_js {
            self.render_with_js = render;
        }
        if let Some(wait) = file.render_wait_until {
            self.render.wait_until = wait.parse()?;
        }
        if let Some(ms) = file.render_timeout_ms {
            self.render.timeout = Duration::from_millis(ms);
        }
        if let Some(ua) = file.render_user_agent {
            self.render.user_agent = Some(ua);
        }
        if let Some(details) = file.render_expand_all_details {
            self.render.expand_all_details = details;
        }
        if let Some(aria) = file.render_expand_aria {
            self.render.expand_aria = aria;
        }
        if let Some(selectors) = file.render_expand_selectors {
            self.render.expand_selectors = selectors;
        }
        if let Some(ms) = file.render_expand_wait_ms {
            self.render.expand_wait = Some(Duration::from_millis(ms));
        }
        Ok(self)
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<CrawlOptions, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(self.base_url));
        }
        if self.max_entries_per_file == 0 {
            return Err(ConfigError::InvalidMaxEntries);
        }
        if let Some(bad) = self
            .priority_map
            .iter()
            .copied()
            .find(|p| !(0.0..=1.0).contains(p))
        {
            return Err(ConfigError::InvalidPriority(bad));
        }

        Ok(CrawlOptions {
            base_url,
            max_depth: self.max_depth,
            strip_querystring: self.strip_querystring,
            ignore_amp: self.ignore_amp,
            last_mod: self.last_mod,
            priority_map: self.priority_map,
            ignore: self.ignore,
            filepath: self.filepath,
            max_entries_per_file: self.max_entries_per_file,
            user_agent: self.user_agent,
            request_timeout: self.request_timeout,
            asset_extensions: self
                .asset_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            asset_path_prefixes: self
                .asset_path_prefixes
                .into_iter()
                .map(|prefix| prefix.to_ascii_lowercase())
                .collect(),
            render: self.render_with_js.then_some(self.render),
        })
    }
}

/// On-disk JSON configuration. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub max_depth: Option<usize>,
    pub strip_querystring: Option<bool>,
    #[serde(rename = "ignoreAMP")]
    pub ignore_amp: Option<bool>,
    pub last_mod: Option<bool>,
    pub priority_map: Option<Vec<f64>>,
    /// Regular expressions; a URL matching any of them is ignored
    #[serde(default)]
    pub ignore: Vec<String>,
    pub filepath: Option<PathBuf>,
    pub max_entries_per_file: Option<usize>,
    pub user_agent: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub asset_extensions: Option<Vec<String>>,
    pub asset_path_prefixes: Option<Vec<String>>,
    pub render_with_js: Option<bool>,
    pub render_wait_until: Option<String>,
    pub render_timeout_ms: Option<u64>,
    pub render_user_agent: Option<String>,
    pub render_expand_all_details: Option<bool>,
    pub render_expand_aria: Option<bool>,
    pub render_expand_selectors: Option<Vec<String>>,
    pub render_expand_wait_ms: Option<u64>,
}

impl FileConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

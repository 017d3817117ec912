// src/robots.rs
// =============================================================================
// robots.txt handling.
//
// Only the universal agent (`User-agent: *`) is honoured and only
// `Disallow:` lines are collected. Matching is a plain path-prefix check:
// no `*`/`$` wildcards, no `Allow:` overrides, no longest-match precedence.
// =============================================================================

use url::Url;

/// Parse robots.txt text into the disallow prefixes that apply to `*`.
///
/// Values are kept verbatim and in file order.
pub fn parse_robots(body: &str) -> Vec<String> {
    let mut disallow = Vec::new();
    let mut applies = false;

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim().to_ascii_lowercase(), value.trim()),
            None => (line.to_ascii_lowercase(), ""),
        };

        match key.as_str() {
            "user-agent" => applies = value == "*",
            "disallow" if applies && !value.is_empty() => disallow.push(value.to_string()),
            _ => {}
        }
    }

    disallow
}

/// Disallow rules loaded once at crawl start. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisallowRules {
    rules: Vec<String>,
}

impl DisallowRules {
    pub fn new(rules: Vec<String>) -> Self {
        Self { rules }
    }

    pub fn parse(body: &str) -> Self {
        Self::new(parse_robots(body))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// True if `url`'s path falls under any rule. Unparseable URLs are
    /// never disallowed; the normalizer has already rejected them.
    pub fn is_disallowed(&self, url: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let path = parsed.path();
        self.rules
            .iter()
            .any(|rule| rule == "/" || path.starts_with(rule.as_str()))
    }
}

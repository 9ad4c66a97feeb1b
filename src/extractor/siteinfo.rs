//! Site-specific content selectors keyed by URL pattern.
//!
//! Rules come from the config file and from an optional SITEINFO-style JSON
//! file. Entries may be flat (`{"url": .., "selector": ..}`) or wrapped the
//! way wedata exports them (`{"data": {"url": .., "pageElement": ..}}`).
//! Entries whose selector is not valid CSS (XPath expressions, mostly) are
//! skipped.

use std::fs;
use std::path::Path;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::error::{Result, SmartRssError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    /// Regular expression matched against the article URL
    pub url: String,
    /// CSS selector of the article body
    #[serde(alias = "pageElement")]
    pub selector: String,
}

impl SiteRule {
    pub fn new(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SiteInfoEntry {
    Wrapped { data: SiteRule },
    Flat(SiteRule),
}

impl From<SiteInfoEntry> for SiteRule {
    fn from(entry: SiteInfoEntry) -> Self {
        match entry {
            SiteInfoEntry::Wrapped { data } => data,
            SiteInfoEntry::Flat(rule) => rule,
        }
    }
}

/// Read the rules of a SITEINFO JSON file
pub fn load_siteinfo(path: &Path) -> Result<Vec<SiteRule>> {
    let raw = fs::read_to_string(path)?;
    parse_siteinfo(&raw)
}

pub fn parse_siteinfo(raw: &str) -> Result<Vec<SiteRule>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| SmartRssError::Config(format!("invalid SITEINFO JSON: {}", e)))?;

    Ok(entries
        .into_iter()
        .filter_map(|value| serde_json::from_value::<SiteInfoEntry>(value).ok())
        .map(SiteRule::from)
        .collect())
}

#[derive(Debug)]
struct CompiledRule {
    url: Regex,
    selector: Selector,
}

/// Compiled site rules, in the order they were given.
#[derive(Debug, Default)]
pub struct SiteRules {
    rules: Vec<CompiledRule>,
}

impl SiteRules {
    pub fn new(rules: &[SiteRule]) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let url = match Regex::new(&rule.url) {
                Ok(url) => url,
                Err(e) => {
                    warn!(pattern = %rule.url, error = %e, "Skipping site rule with invalid URL pattern");
                    continue;
                }
            };
            match Selector::parse(&rule.selector) {
                Ok(selector) => compiled.push(CompiledRule { url, selector }),
                Err(_) => {
                    debug!(selector = %rule.selector, "Skipping site rule without a CSS selector");
                }
            }
        }
        Self { rules: compiled }
    }

    /// Configured rules followed by the ones of `siteinfo_path`. A missing or
    /// broken file only costs its rules.
    pub fn load(rules: &[SiteRule], siteinfo_path: Option<&Path>) -> Self {
        let mut all = rules.to_vec();
        if let Some(path) = siteinfo_path {
            match load_siteinfo(path) {
                Ok(extra) => {
                    debug!(path = %path.display(), count = extra.len(), "Loaded SITEINFO rules");
                    all.extend(extra);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to load SITEINFO file"),
            }
        }
        Self::new(&all)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Selectors of the rules whose pattern matches `url`
    pub fn matching<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Selector> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.url.is_match(url))
            .map(|rule| &rule.selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_flat_and_wrapped_entries() {
        let raw = r#"[
            {"url": "^https://a\\.example/", "selector": ".story"},
            {"name": "b", "data": {"url": "^https://b\\.example/", "pageElement": "article"}},
            {"unrelated": true}
        ]"#;
        let rules = parse_siteinfo(raw).unwrap();
        assert_eq!(
            rules,
            vec![
                SiteRule::new("^https://a\\.example/", ".story"),
                SiteRule::new("^https://b\\.example/", "article"),
            ]
        );
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            parse_siteinfo("{not json"),
            Err(SmartRssError::Config(_))
        ));
    }

    #[test]
    fn test_xpath_and_bad_patterns_are_skipped() {
        let rules = SiteRules::new(&[
            SiteRule::new("^https://a\\.example/", "//div[@id='main']"),
            SiteRule::new("(unclosed", "article"),
            SiteRule::new("^https://c\\.example/", "#content"),
        ]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.matching("https://c.example/post/1").count(), 1);
        assert_eq!(rules.matching("https://a.example/post/1").count(), 0);
    }

    #[test]
    fn test_load_merges_siteinfo_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"url": "^https://b\\.example/", "selector": "main"}}]"#).unwrap();

        let rules = SiteRules::load(
            &[SiteRule::new("^https://a\\.example/", "article")],
            Some(file.path()),
        );
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.matching("https://b.example/x").count(), 1);

        let missing = SiteRules::load(&[], Some(Path::new("/nonexistent/siteinfo.json")));
        assert!(missing.is_empty());
    }
}

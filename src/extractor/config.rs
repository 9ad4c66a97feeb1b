use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::siteinfo::SiteRule;

/// Selector used by selector mode when a source has none, and as the last
/// resort of heuristic mode
pub const DEFAULT_SELECTOR: &str = "body > *:not(footer):not(nav):not(script):not(style):not(header):not(form):not(aside):not(menu)";

/// Configuration for full-text extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Minimum text length for an extraction to be accepted (default: 140)
    pub min_text_length: usize,

    /// CSS selector applied when a source does not set its own
    pub default_selector: String,

    /// Site-specific selectors, tried before the heuristic scorer
    pub site_rules: Vec<SiteRule>,

    /// SITEINFO-style JSON file with more site rules
    pub siteinfo_path: Option<PathBuf>,

    /// User agent string sent with feed and article requests
    pub user_agent: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_text_length: 140,
            default_selector: DEFAULT_SELECTOR.to_string(),
            site_rules: Vec::new(),
            siteinfo_path: None,
            user_agent: Some(format!(
                "Mozilla/5.0 (compatible; smartrss/{})",
                env!("CARGO_PKG_VERSION")
            )),
        }
    }
}

impl ExtractorConfig {
    /// The configured default selector, falling back to the built-in one when blank
    pub fn default_selector(&self) -> &str {
        let selector = self.default_selector.trim();
        if selector.is_empty() {
            DEFAULT_SELECTOR
        } else {
            selector
        }
    }

    /// Create a config that accepts any non-empty extraction
    pub fn lenient() -> Self {
        Self {
            min_text_length: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractorConfig::default();
        assert_eq!(config.min_text_length, 140);
        assert_eq!(config.default_selector(), DEFAULT_SELECTOR);
        assert!(config.site_rules.is_empty());
        assert!(config.user_agent.is_some());
    }

    #[test]
    fn test_blank_selector_uses_builtin() {
        let config = ExtractorConfig {
            default_selector: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.default_selector(), DEFAULT_SELECTOR);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ExtractorConfig = toml::from_str(
            r#"
            min_text_length = 60

            [[site_rules]]
            url = '^https://example\.com/'
            selector = ".story"
            "#,
        )
        .unwrap();
        assert_eq!(config.min_text_length, 60);
        assert_eq!(config.default_selector, DEFAULT_SELECTOR);
        assert_eq!(config.site_rules.len(), 1);
        assert_eq!(config.site_rules[0].selector, ".story");
    }

    #[test]
    fn test_lenient() {
        assert_eq!(ExtractorConfig::lenient().min_text_length, 1);
    }
}

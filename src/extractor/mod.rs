pub mod config;
pub mod siteinfo;

pub use config::{ExtractorConfig, DEFAULT_SELECTOR};
pub use siteinfo::{SiteRule, SiteRules};

use std::collections::HashSet;

use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use crate::app::error::{ExtractionError, Result};
use crate::domain::{FulltextMode, Source};
use crate::normalizer::sanitize::{sanitize_document, sanitize_fragment};
use crate::readability::{Article, Readability, Settings};

/// Which step produced the extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// The page was not HTML; only a download link is returned
    Binary,
    /// The source's own selector, or the default one in selector mode
    Selector,
    /// A site rule matching the article URL
    SiteRule,
    /// The readability scorer at the given skip level
    Heuristic(u8),
    /// The default selector, after the scorer came up short
    DefaultSelector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    /// Sanitized article markup
    pub html: String,
    pub method: Method,
    /// Next page of a paginated article, reported by the scorer
    pub next_page: Option<String>,
}

/// Turns fetched article pages into content for their entries.
#[derive(Debug)]
pub struct ContentExtractor {
    config: ExtractorConfig,
    site_rules: SiteRules,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl ContentExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let site_rules = SiteRules::load(&config.site_rules, config.siteinfo_path.as_deref());
        Self { config, site_rules }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the main content of `html`, fetched from `url` for an entry
    /// of `source`.
    pub fn extract(&self, html: &str, source: &Source, url: &str) -> Result<Extracted> {
        if is_binary(html) {
            debug!(url, "Article is not an HTML page, linking to it");
            return Ok(Extracted {
                html: download_link(url),
                method: Method::Binary,
                next_page: None,
            });
        }

        let cleaned = sanitize_document(html);

        let extracted = match source.fulltext {
            FulltextMode::Disabled => return Err(ExtractionError::Disabled.into()),
            FulltextMode::Selector => {
                let selector = match source.fulltext_position.trim() {
                    "" => self.config.default_selector(),
                    own => own,
                };
                let doc = Html::parse_document(&cleaned);
                Extracted {
                    html: select_outer_html(&doc, selector)?,
                    method: Method::Selector,
                    next_page: None,
                }
            }
            FulltextMode::Heuristic => self.heuristic(&cleaned, url)?,
        };

        Ok(Extracted {
            html: sanitize_fragment(&extracted.html),
            ..extracted
        })
    }

    fn heuristic(&self, cleaned: &str, url: &str) -> Result<Extracted> {
        let min = self.config.min_text_length;

        {
            let doc = Html::parse_document(cleaned);
            for selector in self.site_rules.matching(url) {
                let html = outer_html(&outermost(&doc, selector));
                if text_length(&html) >= min {
                    debug!(url, "Site rule matched");
                    return Ok(Extracted {
                        html,
                        method: Method::SiteRule,
                        next_page: None,
                    });
                }
            }
        }

        let mut longest: Option<(u8, Article)> = None;
        for level in 0..=Settings::MAX_SKIP_LEVEL {
            let article = Readability::extract(cleaned, url, level);
            trace!(url, level, length = article.text_length, "Scored page");
            if article.text_length >= min {
                return Ok(Extracted {
                    html: article.html,
                    method: Method::Heuristic(level),
                    next_page: article.next_page,
                });
            }
            let is_longer = longest
                .as_ref()
                .map(|(_, best)| article.text_length > best.text_length)
                .unwrap_or(true);
            if is_longer {
                longest = Some((level, article));
            }
        }

        let doc = Html::parse_document(cleaned);
        if let Ok(selector) = Selector::parse(self.config.default_selector()) {
            let html = outer_html(&outermost(&doc, &selector));
            if text_length(&html) >= min {
                return Ok(Extracted {
                    html,
                    method: Method::DefaultSelector,
                    next_page: None,
                });
            }
        }

        match longest {
            Some((level, article)) if article.text_length > 0 && !article.html.trim().is_empty() => {
                debug!(url, level, length = article.text_length, "Using the longest short extraction");
                Ok(Extracted {
                    html: article.html,
                    method: Method::Heuristic(level),
                    next_page: article.next_page,
                })
            }
            Some((_, article)) => Err(ExtractionError::InsufficientContent(article.text_length).into()),
            None => Err(ExtractionError::InsufficientContent(0).into()),
        }
    }
}

/// Pages without any `<html>`/`<body>` markup are downloads, not articles
fn is_binary(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    !lower.contains("<body") && !lower.contains("<html")
}

fn download_link(url: &str) -> String {
    let name = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(url);
    format!(
        "<p><a href=\"{}\">{}</a></p>",
        encode_double_quoted_attribute(url),
        encode_text(name)
    )
}

fn select_outer_html(doc: &Html, selector: &str) -> Result<String> {
    let parsed = Selector::parse(selector)
        .map_err(|_| ExtractionError::InvalidSelector(selector.to_string()))?;
    let matches = outermost(doc, &parsed);
    if matches.is_empty() {
        return Err(ExtractionError::NoMatch(selector.to_string()).into());
    }
    Ok(outer_html(&matches))
}

/// Matches of `selector` that are not inside another match
fn outermost<'a>(doc: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    let all: Vec<ElementRef<'a>> = doc.select(selector).collect();
    let ids: HashSet<_> = all.iter().map(|element| element.id()).collect();
    all.into_iter()
        .filter(|element| !element.ancestors().any(|ancestor| ids.contains(&ancestor.id())))
        .collect()
}

fn outer_html(elements: &[ElementRef<'_>]) -> String {
    elements
        .iter()
        .map(|element| element.html().trim().to_string())
        .collect()
}

/// Length of the visible text of a fragment
fn text_length(html: &str) -> usize {
    if html.is_empty() {
        return 0;
    }
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().map(|word| word.chars().count() + 1).sum::<usize>().saturating_sub(1)
}

//! Next-page detection from the links of an article page.

use std::collections::HashMap;

use url::Url;

use super::patterns::{
    BAD_FIRST, CLOSING, DIGITS, DOMAIN, EXTENSION, EXTRANEOUS, FINAL, JUST_DIGITS,
    NEGATIVE, NEXT_LINK, NEXT_PAGE_THRESHOLD, NO_LETTERS, PAGES, PAGE_IN_URL, PAGE_NUMBER, PARAMS,
    POSITIVE, PREV_LINK, PROTOCOL, SLASHES,
};
use super::tree::{Arena, NodeId};

/// The page being scored, split the way link scoring needs it.
#[derive(Debug, Clone)]
pub struct PageUrl {
    protocol: &'static str,
    domain: String,
    /// Directory segments, without the last one
    path: Vec<String>,
    full: String,
    base: String,
    parsed: Option<Url>,
}

impl PageUrl {
    pub fn parse(page_url: &str) -> Option<Self> {
        let parts: Vec<&str> = SLASHES.split(page_url).collect();
        let domain = parts.get(1).filter(|d| !d.is_empty())?.to_string();
        let protocol = if parts[0].contains('s') { "https:" } else { "http:" };
        let path = if parts.len() > 3 {
            parts[2..parts.len() - 1].iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };

        let mut page = Self {
            protocol,
            domain,
            path,
            full: CLOSING.replace(page_url, "").into_owned(),
            base: String::new(),
            parsed: Url::parse(page_url).ok(),
        };
        page.base = page.find_base_url();
        Some(page)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The article URL with paging segments removed
    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    /// Resolve an `href`/`src` value against the page
    pub fn resolve(&self, link: &str) -> String {
        if PROTOCOL.is_match(link) {
            return link.to_string();
        }
        match self.parsed {
            Some(ref base) => base
                .join(link)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| link.to_string()),
            None => link.to_string(),
        }
    }

    fn find_base_url(&self) -> String {
        if self.path.is_empty() {
            return PARAMS.replace(&self.full, "").into_owned();
        }

        let last = self.path.len() - 1;
        let mut cleaned = String::new();
        for segment in &self.path[..last] {
            cleaned.push('/');
            cleaned.push_str(&EXTENSION.replace_all(segment, ""));
        }

        let without_params = PARAMS.replace(&self.full, "");
        let mut first = without_params
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let mut second = self.path[last].clone();

        if !(second.chars().count() < 3 && NO_LETTERS.is_match(&first)) && !JUST_DIGITS.is_match(&second) {
            if PAGE_IN_URL.is_match(&second) {
                second = PAGE_IN_URL.replace(&second, "").into_owned();
            }
            cleaned.push('/');
            cleaned.push_str(&second);
        }

        if !BAD_FIRST.is_match(&first) {
            if PAGE_IN_URL.is_match(&first) {
                first = PAGE_IN_URL.replace(&first, "").into_owned();
            }
            cleaned.push('/');
            cleaned.push_str(&first);
        }

        format!("{}//{}{}", self.protocol, self.domain, cleaned)
    }
}

#[derive(Debug, Clone)]
struct ScannedLink {
    href: String,
    score: i64,
    text: String,
}

/// Accumulates scores of links that may lead to the next page.
#[derive(Debug, Clone, Default)]
pub struct LinkScanner {
    links: Vec<ScannedLink>,
    index: HashMap<String, usize>,
}

impl LinkScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score the closed `a` element `id`
    pub fn scan(&mut self, arena: &Arena, id: NodeId, page: Option<&PageUrl>) {
        let node = &arena[id];
        let Some(href) = node.attr("href") else {
            return;
        };
        let href = CLOSING.replace(href, "").into_owned();

        if let Some(page) = page {
            if href == page.base_url() || href == page.full() {
                return;
            }
        }

        let Some(domain) = DOMAIN.captures(&href).map(|c| c[1].to_string()) else {
            return;
        };
        if let Some(page) = page {
            if domain != page.domain() {
                return;
            }
        }

        let text = arena.text(id);
        if text.chars().count() > 25 || EXTRANEOUS.is_match(&text) {
            return;
        }
        let remainder = match page {
            Some(page) if !page.base_url().is_empty() => href.replacen(page.base_url(), "", 1),
            _ => href.clone(),
        };
        if !DIGITS.is_match(&remainder) {
            return;
        }

        let link_data = format!("{}{}", text, node.element_data);
        let mut score: i64 = 0;

        if NEXT_LINK.is_match(&link_data) {
            score += 50;
        }
        if PAGES.is_match(&link_data) {
            score += 25;
        }
        if FINAL.is_match(&link_data) && !NEXT_LINK.is_match(&text) {
            let seen_as_next = self
                .index
                .get(&href)
                .map(|i| NEXT_LINK.is_match(&self.links[*i].text))
                .unwrap_or(false);
            if !seen_as_next {
                score -= 65;
            }
        }
        if NEGATIVE.is_match(&link_data) || EXTRANEOUS.is_match(&link_data) {
            score -= 50;
        }
        if PREV_LINK.is_match(&link_data) {
            score -= 200;
        }
        if PAGE_NUMBER.is_match(&href) || PAGES.is_match(&href) {
            score += 25;
        }
        if EXTRANEOUS.is_match(&href) {
            score -= 15;
        }

        let (mut positive, mut negative) = (true, true);
        let mut current = node.parent;
        while let Some(parent) = current {
            let data = arena[parent].element_data.as_str();
            current = arena[parent].parent;
            if data.is_empty() {
                continue;
            }
            if positive && PAGES.is_match(data) {
                score += 25;
                if !negative {
                    break;
                }
                positive = false;
            }
            if negative && NEGATIVE.is_match(data) && !POSITIVE.is_match(data) {
                score -= 25;
                if !positive {
                    break;
                }
                negative = false;
            }
        }

        if let Some(number) = page_number(&text) {
            if number == 1 {
                score -= 10;
            } else if number < 10 {
                score += 10 - i64::from(number);
            }
        }

        match self.index.get(&href) {
            Some(i) => {
                let link = &mut self.links[*i];
                link.score += score;
                link.text.push(' ');
                link.text.push_str(&text);
            }
            None => {
                self.index.insert(href.clone(), self.links.len());
                self.links.push(ScannedLink { href, score, text });
            }
        }
    }

    /// Best scoring link above the threshold, first one on ties
    pub fn next_page(&self) -> Option<String> {
        let mut best: Option<&ScannedLink> = None;
        for link in &self.links {
            let top = best.map(|b| b.score).unwrap_or(NEXT_PAGE_THRESHOLD);
            if link.score > top {
                best = Some(link);
            }
        }
        best.map(|link| link.href.clone())
    }
}

/// Leading unsigned page number of a link text
fn page_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readability::tree::Child;

    #[test]
    fn test_page_url_parts() {
        let page = PageUrl::parse("https://example.com/news/2024/story.html#top").unwrap();
        assert_eq!(page.domain(), "example.com");
        assert_eq!(page.full(), "https://example.com/news/2024/story.html");
        assert_eq!(page.base_url(), "https://example.com/news/2024/story.html");
    }

    #[test]
    fn test_base_url_drops_page_numbers() {
        let page = PageUrl::parse("http://example.com/articles/story/2").unwrap();
        assert_eq!(page.base_url(), "http://example.com/articles/story");

        let page = PageUrl::parse("http://example.com/story-page2").unwrap();
        assert_eq!(page.base_url(), "http://example.com/story-page2");
    }

    #[test]
    fn test_resolve() {
        let page = PageUrl::parse("https://example.com/a/b.html").unwrap();
        assert_eq!(page.resolve("c.html"), "https://example.com/a/c.html");
        assert_eq!(page.resolve("/x"), "https://example.com/x");
        assert_eq!(page.resolve("https://other.org/y"), "https://other.org/y");
    }

    #[test]
    fn test_next_page_requires_threshold() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let page = PageUrl::parse("https://example.com/story/1").unwrap();

        let next = arena.alloc("a", Some(root));
        arena[next].set_attr("href", "https://example.com/story/2");
        arena[next].children.push(Child::Text("Next »".into()));

        let other = arena.alloc("a", Some(root));
        arena[other].set_attr("href", "https://example.com/tags/42");
        arena[other].children.push(Child::Text("rust".into()));

        let mut scanner = LinkScanner::new();
        scanner.scan(&arena, next, Some(&page));
        scanner.scan(&arena, other, Some(&page));
        assert_eq!(scanner.next_page().as_deref(), Some("https://example.com/story/2"));

        let mut scanner = LinkScanner::new();
        scanner.scan(&arena, other, Some(&page));
        assert_eq!(scanner.next_page(), None);
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(" 3 "), Some(3));
        assert_eq!(page_number("12 next"), Some(12));
        assert_eq!(page_number("-9223372036854775807"), None);
        assert_eq!(page_number("99999999999999999999"), None);
        assert_eq!(page_number("next"), None);
    }

    #[test]
    fn test_negative_link_numbers_are_not_page_numbers() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let link = arena.alloc("a", Some(root));
        arena[link].set_attr("href", "https://example.com/story/2");
        arena[link].children.push(Child::Text("-9223372036854775807".into()));

        let page = PageUrl::parse("https://example.com/story/1").unwrap();
        let mut scanner = LinkScanner::new();
        scanner.scan(&arena, link, Some(&page));
        assert_eq!(scanner.next_page(), None);
    }

    #[test]
    fn test_foreign_domains_are_ignored() {
        let mut arena = Arena::new();
        let root = arena.alloc("div", None);
        let link = arena.alloc("a", Some(root));
        arena[link].set_attr("href", "https://elsewhere.org/page/2");
        arena[link].children.push(Child::Text("next".into()));

        let page = PageUrl::parse("https://example.com/story").unwrap();
        let mut scanner = LinkScanner::new();
        scanner.scan(&arena, link, Some(&page));
        assert_eq!(scanner.next_page(), None);
    }
}

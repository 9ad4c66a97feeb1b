//! Heuristic main-content detection.
//!
//! The page is walked once, producing open/attribute/text/close events that
//! build an arena of [`ScoredNode`]s. Elements are cleaned and scored as they
//! close, so every node sees the final metrics of its children. After the
//! walk the best candidate and its related siblings form the article.

pub mod pagination;
pub mod patterns;
pub mod tree;

use scraper::{ElementRef, Html, Node};

use pagination::{LinkScanner, PageUrl};
use patterns::*;
use tree::{Arena, Child, NodeId};

pub use tree::ScoredNode;

/// Which cleaning passes run while the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Drop elements whose class/id look like page furniture (default: true)
    pub strip_unlikely_candidates: bool,
    /// Score class/id values (default: true)
    pub weight_attributes: bool,
    /// Remove containers based on their metrics (default: true)
    pub clean_conditionally: bool,
    /// Keep only allow-listed attributes (default: true)
    pub clean_attributes: bool,
    /// Score links as candidates for the next page (default: true)
    pub search_further_pages: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strip_unlikely_candidates: true,
            weight_attributes: true,
            clean_conditionally: true,
            clean_attributes: true,
            search_further_pages: true,
        }
    }
}

impl Settings {
    /// Highest skip level; each level disables one more cleaning pass
    pub const MAX_SKIP_LEVEL: u8 = 3;

    pub fn with_skip_level(mut self, level: u8) -> Self {
        if level >= 1 {
            self.strip_unlikely_candidates = false;
        }
        if level >= 2 {
            self.weight_attributes = false;
        }
        if level >= 3 {
            self.clean_conditionally = false;
        }
        self
    }
}

/// The extracted main content of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    /// Inner HTML of the article node
    pub html: String,
    /// Plain-text rendering
    pub text: String,
    /// Non-link text length of the article node
    pub text_length: usize,
    pub next_page: Option<String>,
    /// Score of the winning candidate, 0 when none was found
    pub score: f64,
}

/// Pending step of the document walk
enum Event<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Close(String),
}

/// Queue the children of `element` so they pop in document order
fn push_children<'a>(stack: &mut Vec<Event<'a>>, element: ElementRef<'a>) {
    let children: Vec<Event<'a>> = element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(Event::Text(&**text)),
            Node::Element(_) => ElementRef::wrap(child).map(Event::Open),
            _ => None,
        })
        .collect();
    stack.extend(children.into_iter().rev());
}

pub struct Readability {
    settings: Settings,
    page: Option<PageUrl>,
    arena: Arena,
    root: NodeId,
    current: NodeId,
    orig_title: String,
    header_title: String,
    links: LinkScanner,
}

impl Readability {
    pub fn new(page_url: Option<&str>, settings: Settings) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc("document", None);
        Self {
            settings,
            page: page_url.and_then(PageUrl::parse),
            arena,
            root,
            current: root,
            orig_title: String::new(),
            header_title: String::new(),
            links: LinkScanner::new(),
        }
    }

    /// Score `html` as found at `page_url` and return its article.
    pub fn extract(html: &str, page_url: &str, skip_level: u8) -> Article {
        let doc = Html::parse_document(html);
        let settings = Settings::default().with_skip_level(skip_level);
        let mut readability = Self::new(Some(page_url), settings);
        readability.process(&doc);
        readability.into_article()
    }

    /// Feed the events of a parsed document into the tree.
    ///
    /// The walk keeps its own stack so arbitrarily deep pages can't exhaust
    /// the thread stack.
    pub fn process(&mut self, doc: &Html) {
        let mut stack = vec![Event::Open(doc.root_element())];
        while let Some(event) = stack.pop() {
            match event {
                Event::Text(text) => self.on_text(text),
                Event::Close(name) => self.on_close_tag(&name),
                Event::Open(element) => self.open_element(element, &mut stack),
            }
        }
    }

    fn open_element<'a>(&mut self, element: ElementRef<'a>, stack: &mut Vec<Event<'a>>) {
        let name = element.value().name().to_ascii_lowercase();

        if TRANSPARENT_TAGS.contains(&name.as_str()) || FORMAT_TAGS.contains(&name.as_str()) {
            if FORMAT_TAGS.contains(&name.as_str()) {
                let id = self.arena.alloc(&name, Some(self.current));
                self.arena[self.current].children.push(Child::Element(id));
            } else if name == "source" {
                // hoisted onto the enclosing player
                if let Some(src) = element.value().attr("src") {
                    if matches!(self.arena[self.current].tag.as_str(), "audio" | "video") {
                        self.on_attribute("src", src);
                    }
                }
            }
            push_children(stack, element);
            return;
        }

        self.on_open_tag(&name);
        for (attr, value) in element.value().attrs() {
            self.on_attribute(attr, value);
        }
        stack.push(Event::Close(name));
        push_children(stack, element);
    }

    fn on_open_tag(&mut self, name: &str) {
        self.current = self.arena.alloc(name, Some(self.current));
    }

    fn on_text(&mut self, text: &str) {
        self.arena[self.current]
            .children
            .push(Child::Text(text.to_string()));
    }

    fn on_attribute(&mut self, name: &str, value: &str) {
        if value.is_empty()
            || JS_ATTRIBUTE.is_match(value)
            || name.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("on"))
        {
            return;
        }
        let name = name.to_ascii_lowercase();
        let id = self.current;

        if name.starts_with("data-") {
            // lazy-loaded images
            if PROTOCOL.find_iter(value).count() == 1 && IMG_URL.is_match(value) {
                self.arena[id].set_attr("src", value);
            }
        } else if name == "href" || name == "src" {
            if self.arena[id].attr(&name).is_none() {
                let resolved = match self.page {
                    Some(ref page) => page.resolve(value),
                    None => value.to_string(),
                };
                self.arena[id].set_attr(&name, &resolved);
            }
        } else if name == "id" || name == "class" {
            let value = value.trim().to_lowercase();
            if self.settings.weight_attributes {
                let node = &mut self.arena[id];
                if SAFE.is_match(&value) {
                    node.attribute_score += 100.0;
                    node.is_candidate = true;
                } else if NEGATIVE.is_match(&value) {
                    node.attribute_score -= 25.0;
                } else if POSITIVE.is_match(&value) {
                    node.attribute_score += 25.0;
                } else if UNLIKELY_CANDIDATES.is_match(&value) {
                    node.attribute_score -= 5.0;
                } else if MAYBE_CANDIDATE.is_match(&value) {
                    node.attribute_score += 5.0;
                }
            }
            let node = &mut self.arena[id];
            node.element_data.push(' ');
            node.element_data.push_str(&value);
        } else if matches!(self.arena[id].tag.as_str(), "img" | "svg") {
            let Some(parent) = self.arena[id].parent else {
                return;
            };
            if name == "width" || name == "height" {
                let Some(size) = leading_int(value) else {
                    return;
                };
                let (large, medium) = if name == "width" { (400, 200) } else { (300, 150) };
                if size <= 32 {
                    self.arena[id].dropped = true;
                } else if size >= large {
                    self.arena[parent].attribute_score += 20.0;
                } else if size >= medium {
                    self.arena[parent].attribute_score += 5.0;
                }
            } else if name == "alt" {
                self.arena[parent].attribute_score += 10.0;
            }
        } else if !self.settings.clean_attributes || GOOD_ATTRIBUTES.contains(&name.as_str()) {
            self.arena[id].set_attr(&name, value);
        }
    }

    fn on_close_tag(&mut self, name: &str) {
        let id = self.current;
        let Some(parent) = self.arena[id].parent else {
            return;
        };
        self.current = parent;

        if self.settings.search_further_pages && name == "a" {
            self.links.scan(&self.arena, id, self.page.as_ref());
        } else if name == "title" && self.orig_title.is_empty() {
            self.orig_title = collapse_whitespace(&self.arena.text(id));
            return;
        } else if HEADER_TAGS.contains(&name) {
            let title = collapse_whitespace(&self.arena.text(id));
            if !self.orig_title.is_empty() {
                if self.orig_title.contains(&title) {
                    if word_parts(&title) >= 4 {
                        self.header_title = title;
                    }
                    return;
                }
                if name == "h1" || name == "h2" {
                    return;
                }
            } else if self.header_title.is_empty() && (name == "h1" || name == "h2") {
                self.header_title = title;
                return;
            }
        }

        if TAGS_TO_REMOVE.contains(&name) || self.arena[id].dropped {
            return;
        }
        if self.settings.strip_unlikely_candidates {
            let data = &self.arena[id].element_data;
            if UNLIKELY_CANDIDATES.is_match(data) && !MAYBE_CANDIDATE.is_match(data) {
                return;
            }
        }

        if name == "div" {
            if let [Child::Element(only)] = self.arena[id].children.as_slice() {
                let only = *only;
                if UNPACK_DIVS.contains(&self.arena[only].tag.as_str()) {
                    self.arena[only].parent = Some(parent);
                    self.arena[parent].children.push(Child::Element(only));
                    return;
                }
            }
        }

        self.arena.compute_info(id);

        if EMBEDS.contains(&name) {
            if !self.keeps_embed(id) {
                return;
            }
        } else if name == "h2" || name == "h3" {
            let node = &self.arena[id];
            if node.attribute_score < 0.0 || node.info.density > 0.33 {
                return;
            }
        } else if self.settings.clean_conditionally
            && CLEAN_CONDITIONALLY.contains(&name)
            && self.fails_conditional_clean(id, name)
        {
            return;
        }

        if self.is_empty_removable(id, name) {
            return;
        }

        self.arena[parent].children.push(Child::Element(id));
        self.score_paragraph(id, name);
    }

    /// Embeds survive only when they point at a known video host or a
    /// media file.
    fn keeps_embed(&self, id: NodeId) -> bool {
        let is_media = |src: &str| VIDEOS.is_match(src) || MEDIA_FILE.is_match(src);
        let node = &self.arena[id];
        if node.attr("src").is_some_and(is_media) {
            return true;
        }
        match node.children.first() {
            Some(Child::Element(child)) => self.arena[*child].attr("src").is_some_and(is_media),
            _ => false,
        }
    }

    fn fails_conditional_clean(&self, id: NodeId, name: &str) -> bool {
        let node = &self.arena[id];
        let info = &node.info;
        let content_length = info.content_length();

        if content_length == 0 {
            match node.children.as_slice() {
                [] | [Child::Text(_)] => return true,
                _ => {}
            }
        }
        if name != "ul" && name != "ol" {
            if let Some(li) = info.tag_count.get("li") {
                if *li as i64 - 100 > info.count("p") as i64 {
                    return true;
                }
            }
        }
        let images = info.count("img");
        if content_length < 25 && (images == 0 || images > 2) {
            return true;
        }
        if info.density > 0.5 {
            return true;
        }
        if node.attribute_score < 25.0 && info.density > 0.2 {
            return true;
        }
        let embeds = info.count("embed");
        (embeds == 1 && content_length < 75) || embeds > 1
    }

    fn is_empty_removable(&self, id: NodeId, name: &str) -> bool {
        let node = &self.arena[id];
        let applies = REMOVE_IF_EMPTY.contains(&name)
            || (!self.settings.clean_conditionally && CLEAN_CONDITIONALLY.contains(&name));
        applies
            && node.info.content_length() == 0
            && !node.children.is_empty()
            && !OKAY_IF_EMPTY.iter().any(|tag| node.info.count(tag) > 0)
    }

    fn score_paragraph(&mut self, id: NodeId, name: &str) {
        match name {
            "p" | "pre" | "td" | "code" => {}
            "div" => {
                let info = &self.arena[id].info;
                if DIV_TO_P_ELEMENTS.iter().any(|tag| info.count(tag) > 0) {
                    return;
                }
                self.arena[id].tag = "p".to_string();
            }
            _ => return,
        }

        let content_length = self.arena[id].info.content_length();
        if content_length <= MIN_PARAGRAPH_LENGTH {
            return;
        }
        let Some(parent) = self.arena[id].parent else {
            return;
        };
        let Some(grandparent) = self.arena[parent].parent else {
            return;
        };

        let score = 1.0
            + self.arena[id].info.commas as f64
            + (content_length / SCORE_CHARS_IN_PARAGRAPH).min(3) as f64;

        self.arena[parent].is_candidate = true;
        self.arena[parent].tag_score += score;
        self.arena[grandparent].is_candidate = true;
        self.arena[grandparent].tag_score += score / GRANDPARENT_SCORE_DIVISOR;
        if let Some(great) = self.arena[grandparent].parent {
            self.arena[great].tag_score += score / (2.0 * GRANDPARENT_SCORE_DIVISOR);
        }
    }

    /// Pick the best scoring candidate, first one in document order on ties.
    fn top_candidate(&mut self) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for id in self.arena.descendants(self.root) {
            let node = &mut self.arena[id];
            if !node.is_candidate {
                continue;
            }
            node.tag_score += tag_weight(&node.tag);
            let score = ((node.tag_score + node.attribute_score) * (1.0 - node.info.density)).floor();
            node.total_score = score;
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    fn candidate_siblings(&mut self, top: NodeId, parent: NodeId) -> Vec<NodeId> {
        let winner_score = self.arena[top].total_score;
        let threshold = (winner_score * SIBLING_SCORE_MULTIPLIER).max(10.0);
        let winner_tokens: Vec<String> = self.arena[top].tokens().map(str::to_string).collect();

        let siblings: Vec<NodeId> = self.arena.element_children(parent).collect();
        let mut joined = Vec::new();
        for id in siblings {
            if id == top {
                joined.push(id);
                continue;
            }
            let sibling = &self.arena[id];
            let overlaps = sibling.tokens().any(|t| winner_tokens.iter().any(|w| w == t));
            let by_class = overlaps
                && sibling.total_score + winner_score * SIBLING_SCORE_MULTIPLIER >= threshold;
            let by_score = sibling.is_candidate && sibling.total_score >= threshold;
            let by_paragraph = sibling.tag == "p" && self.is_paragraph_sibling(id);

            if by_class && sibling.tag != "p" {
                self.arena[id].tag = "div".to_string();
            }
            if by_class || by_score || by_paragraph {
                joined.push(id);
            }
        }
        joined
    }

    fn is_paragraph_sibling(&self, id: NodeId) -> bool {
        let info = &self.arena[id].info;
        if info.text_length >= MIN_NODE_LENGTH {
            info.density < MAX_LINK_DENSITY
        } else {
            info.density == 0.0 && SENTENCE.is_match(&self.arena.text(id))
        }
    }

    /// The node whose content becomes the article
    fn candidate_node(&mut self, top: Option<NodeId>) -> NodeId {
        let mut node = match top {
            None => {
                self.arena.compute_info(self.root);
                self.root
            }
            Some(top) => {
                let parent = self.arena[top]
                    .parent
                    .filter(|p| self.arena[*p].children.len() > 1);
                match parent {
                    Some(parent) => {
                        let siblings = self.candidate_siblings(top, parent);
                        let article = self.arena.alloc("article", None);
                        self.arena[article].children =
                            siblings.into_iter().map(Child::Element).collect();
                        self.arena.compute_info(article);
                        article
                    }
                    None => top,
                }
            }
        };

        while let [Child::Element(only)] = self.arena[node].children.as_slice() {
            node = *only;
        }
        node
    }

    /// Title of the page: a header matching the document title, else the
    /// document title without site decorations.
    pub fn title(&self) -> String {
        if !self.header_title.is_empty() {
            return self.header_title.clone();
        }
        let original = self.orig_title.as_str();
        if original.is_empty() {
            return String::new();
        }

        let mut title = original.to_string();
        if TITLE_SEPARATOR.is_match(original) {
            title = TITLE_BEFORE_LAST_SEPARATOR.replace(original, "$1").into_owned();
            if word_parts(&title) < 3 {
                title = TITLE_AFTER_FIRST_SEPARATOR.replace(original, "$1").into_owned();
            }
        } else if let Some(pos) = original.rfind(": ") {
            title = original[pos + 2..].to_string();
            if word_parts(&title) < 3 {
                if let Some(first) = original.find(": ") {
                    title = original[first + 2..].to_string();
                }
            }
        }

        let title = title.trim();
        if word_parts(title) < 5 {
            original.to_string()
        } else {
            title.to_string()
        }
    }

    pub fn next_page(&self) -> Option<String> {
        self.links.next_page()
    }

    pub fn into_article(mut self) -> Article {
        let top = self.top_candidate();
        let node = self.candidate_node(top);

        let html = self.arena.inner_html(node);
        let html = BREAKS_BEFORE_P.replace_all(&html, "$1");
        let html = SPACES_BEFORE_BR.replace_all(&html, "$1");
        let html = DOUBLE_BREAKS.replace_all(&html, "</p><p>");
        let html = SPACE_RUNS.replace_all(&html, " ").into_owned();

        let text = self.arena.formatted_text(node);
        let text = BLANK_LINES.replace_all(text.trim(), "\n\n").into_owned();

        Article {
            title: self.title(),
            html,
            text,
            text_length: self.arena[node].info.text_length,
            next_page: self.next_page(),
            score: top.map(|id| self.arena[id].total_score).unwrap_or(0.0),
        }
    }
}

//! HTML clean-up shared by feed content and fetched article pages.

use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

/// Label of the link that replaces embedded objects
pub const EMBEDDED_MEDIA: &str = "[embedded media]";

const REMOVED_TAGS: &[&str] = &["script", "style", "noscript", "link", "param", "meta"];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "src",
    "href",
    "alt",
    "title",
    "data",
    "height",
    "width",
    "name",
    "value",
    "type",
    "border",
    "frameborder",
    "colspan",
    "rowspan",
    "span",
    "cite",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    /// Feed content and extracted articles: attributes are allow-listed
    Fragment,
    /// Whole pages about to be scored: attributes stay for class/id weighting
    Document,
}

#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    mode: SanitizeMode,
}

impl Sanitizer {
    pub fn new(mode: SanitizeMode) -> Self {
        Self { mode }
    }

    pub fn fragment() -> Self {
        Self::new(SanitizeMode::Fragment)
    }

    pub fn document() -> Self {
        Self::new(SanitizeMode::Document)
    }

    pub fn clean(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        match self.mode {
            SanitizeMode::Fragment => {
                let doc = Html::parse_fragment(html);
                let mut stack = Vec::new();
                push_children(&mut stack, doc.root_element());
                self.write(stack, &mut out);
            }
            SanitizeMode::Document => {
                let doc = Html::parse_document(html);
                self.write(vec![Step::Open(doc.root_element())], &mut out);
            }
        }
        WHITESPACE_RUN.replace_all(out.trim(), " ").into_owned()
    }

    /// Embedded objects turned into plain links. Pages keep their iframes so
    /// the scorer can decide which video embeds survive.
    fn is_replaced(&self, tag: &str) -> bool {
        match self.mode {
            SanitizeMode::Fragment => matches!(tag, "object" | "iframe" | "applet"),
            SanitizeMode::Document => matches!(tag, "object" | "applet"),
        }
    }

    /// Serialize with an explicit stack; page nesting depth is unbounded.
    fn write<'a>(&self, mut stack: Vec<Step<'a>>, out: &mut String) {
        while let Some(step) = stack.pop() {
            match step {
                Step::Text(text) => out.push_str(&encode_text(text)),
                Step::Close(name) => {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
                Step::Open(element) => self.open_element(element, &mut stack, out),
            }
        }
    }

    fn open_element<'a>(&self, element: ElementRef<'a>, stack: &mut Vec<Step<'a>>, out: &mut String) {
        let raw_name = element.value().name();
        let name = raw_name.strip_prefix("xhtml:").unwrap_or(raw_name);

        if REMOVED_TAGS.contains(&name) || has_script_href(element) {
            return;
        }

        if self.is_replaced(name) {
            let target = element
                .value()
                .attr("src")
                .or_else(|| element.value().attr("data"))
                .map(str::trim)
                .filter(|s| !s.is_empty());
            if let Some(target) = target {
                out.push_str("<a href=\"");
                out.push_str(&encode_double_quoted_attribute(target));
                out.push_str("\">");
                out.push_str(EMBEDDED_MEDIA);
                out.push_str("</a>");
            }
            return;
        }

        out.push('<');
        out.push_str(name);
        for (attr, value) in element.value().attrs() {
            if self.mode == SanitizeMode::Fragment && !ALLOWED_ATTRIBUTES.contains(&attr) {
                continue;
            }
            out.push(' ');
            out.push_str(attr);
            out.push_str("=\"");
            out.push_str(&encode_double_quoted_attribute(value));
            out.push('"');
        }
        out.push('>');

        if VOID_TAGS.contains(&name) {
            return;
        }

        stack.push(Step::Close(name));
        push_children(stack, element);
    }
}

/// Pending work of the serializer
enum Step<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Close(&'a str),
}

/// Queue the children of `element` so they pop in document order
fn push_children<'a>(stack: &mut Vec<Step<'a>>, element: ElementRef<'a>) {
    let children: Vec<Step<'a>> = element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(Step::Text(&**text)),
            Node::Element(_) => ElementRef::wrap(child).map(Step::Open),
            _ => None,
        })
        .collect();
    stack.extend(children.into_iter().rev());
}

fn has_script_href(element: ElementRef<'_>) -> bool {
    element
        .value()
        .attr("href")
        .map(|href| href.trim_start().to_ascii_lowercase().starts_with("javascript:"))
        .unwrap_or(false)
}

/// Clean feed-provided or extracted markup into a safe fragment.
pub fn sanitize_fragment(html: &str) -> String {
    Sanitizer::fragment().clean(html)
}

/// Strip unwanted elements from a whole page, keeping attributes.
pub fn sanitize_document(html: &str) -> String {
    Sanitizer::document().clean(html)
}

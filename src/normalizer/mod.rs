pub mod entities;
pub mod sanitize;

use chrono::Utc;
use html_escape::{encode_double_quoted_attribute, encode_text};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Edge, Node, ParsingOptions};
use tracing::debug;
use url::Url;

use crate::app::{Result, SmartRssError};
use crate::domain::{Item, Source, SourceUpdate, DEFAULT_UPDATE_EVERY, EMPTY_CONTENT};

pub use sanitize::{sanitize_document, sanitize_fragment, SanitizeMode, Sanitizer};

/// Title given to feeds that declare none
pub const DEFAULT_FEED_TITLE: &str = "RSS feed";

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Refresh intervals a feed's declared ttl is snapped onto, in minutes
const UPDATE_LADDER: [i64; 10] = [5, 15, 30, 60, 120, 180, 360, 720, 1440, 10080];

static MEDIA_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(?:ogg|mp4|webm|wav|aac|opus|mp3|flac|ogm|fla)(?:[?#]|$)")
        .expect("valid media regex")
});

static AUDIO_OR_VIDEO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)video|audio").expect("valid media type regex"));

/// Result of parsing one feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Feed title, or the generic fallback
    pub title: String,
    /// Side effects on the source: title, base and inferred interval
    pub update: SourceUpdate,
    pub entries: Vec<Item>,
}

#[derive(Clone)]
pub struct FeedParser;

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source: &Source, body: &[u8]) -> Result<ParsedFeed> {
        let text = String::from_utf8_lossy(body);
        let text = text.trim_start_matches('\u{feff}').trim_start();

        let options = ParsingOptions {
            allow_dtd: true,
            ..Default::default()
        };
        let doc = Document::parse_with_options(text, options)
            .map_err(|e| SmartRssError::Parse(e.to_string()))?;

        let mut nodes: Vec<Node> = elements_named(&doc, "item");
        if nodes.is_empty() {
            nodes = elements_named(&doc, "entry");
        }
        if nodes.is_empty() {
            return Err(SmartRssError::Parse("no entries found".into()));
        }

        let title = feed_title(&doc);
        let mut update = SourceUpdate::default();
        if source.has_placeholder_title() {
            update.title = Some(title.clone());
        }
        if source.last_update == 0 {
            update.update_every = Some(snap_update_interval(declared_interval(&doc)));
        }

        let base = document_base(&doc);
        if let Some(ref base) = base {
            update.base = Some(base.clone());
        }
        let resolver = LinkResolver::new(base.as_deref().unwrap_or(&source.base), &source.url);
        let is_atom = doc.root_element().tag_name().name().eq_ignore_ascii_case("feed");

        let now = Utc::now().timestamp_millis();
        let entries: Vec<Item> = nodes
            .into_iter()
            .map(|node| {
                let link = entry_link(node, is_atom).map(|l| resolver.resolve(&l));
                let seed = child_text(node, &["guid"]).or_else(|| link.clone());
                let raw_title = find_descendant(node, &["title"]).map(text_content);
                let entry_title = entities::clean_title(raw_title.as_deref().unwrap_or_default());
                let date = entry_date(node);

                let mut item = Item::new(
                    Item::generate_id(&source.id, seed.as_deref(), &entry_title, date),
                    source.id.clone(),
                );
                item.title = entry_title;
                item.url = link.unwrap_or_default();
                item.date = if date == 0 { now } else { date };
                item.date_created = now;
                item.author = entities::clean_author(entry_author(node).as_deref(), &title);
                item.content = entry_content(node);
                item
            })
            .collect();

        debug!(source_id = %source.id, entries = entries.len(), "Parsed feed");

        Ok(ParsedFeed {
            title,
            update,
            entries,
        })
    }
}

/// Snap a declared interval onto the refresh ladder.
///
/// The smallest ladder value the raw interval does not exceed is used,
/// capped at a week. Missing or non-positive values give the default.
pub fn snap_update_interval(raw: Option<f64>) -> i64 {
    match raw {
        Some(minutes) if minutes > 0.0 => UPDATE_LADDER
            .iter()
            .copied()
            .find(|step| *step as f64 >= minutes)
            .unwrap_or(UPDATE_LADDER[UPDATE_LADDER.len() - 1]),
        _ => DEFAULT_UPDATE_EVERY,
    }
}

fn elements_named<'a, 'i>(doc: &'a Document<'i>, name: &str) -> Vec<Node<'a, 'i>> {
    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case(name))
        .collect()
}

fn is_named(node: Node, names: &[&str]) -> bool {
    node.is_element()
        && names
            .iter()
            .any(|name| node.tag_name().name().eq_ignore_ascii_case(name))
}

/// First descendant element (document order) matching one of `names`
fn find_descendant<'a, 'i>(node: Node<'a, 'i>, names: &[&str]) -> Option<Node<'a, 'i>> {
    node.descendants().skip(1).find(|n| is_named(*n, names))
}

fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn child_text(node: Node, names: &[&str]) -> Option<String> {
    find_descendant(node, names)
        .map(|n| text_content(n).trim().to_string())
        .filter(|t| !t.is_empty())
}

/// First `container > name` element with non-blank text
fn feed_level_text(doc: &Document, name: &str) -> Option<String> {
    doc.descendants()
        .filter(|n| is_named(*n, &[name]))
        .filter(|n| {
            n.parent_element()
                .map(|p| is_named(p, &["channel", "feed", "rss"]))
                .unwrap_or(false)
        })
        .map(|n| text_content(n).trim().to_string())
        .find(|t| !t.is_empty())
}

fn feed_title(doc: &Document) -> String {
    feed_level_text(doc, "title")
        .or_else(|| feed_level_text(doc, "description"))
        .or_else(|| feed_level_text(doc, "link"))
        .unwrap_or_else(|| DEFAULT_FEED_TITLE.to_string())
}

fn leading_number(text: &str) -> Option<f64> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<f64>().ok()
}

/// Refresh interval declared by the feed, in minutes
fn declared_interval(doc: &Document) -> Option<f64> {
    let ttl = feed_level_text(doc, "ttl")
        .and_then(|t| leading_number(&t))
        .filter(|t| *t > 0.0);
    if ttl.is_some() {
        return ttl;
    }

    let period = doc
        .descendants()
        .find(|n| is_named(*n, &["updatePeriod"]))?;
    let minutes = match text_content(period).trim() {
        "hourly" => 60.0,
        "weekly" => 10080.0,
        "monthly" => 43800.0,
        "yearly" => 525600.0,
        _ => 1440.0,
    };
    let frequency = doc
        .descendants()
        .find(|n| is_named(*n, &["updateFrequency"]))
        .and_then(|n| leading_number(&text_content(n)))
        .filter(|f| *f > 0.0)
        .unwrap_or(1.0);
    Some(minutes / frequency)
}

fn document_base(doc: &Document) -> Option<String> {
    let root = doc.root_element();
    if !is_named(root, &["rss", "rdf", "feed"]) {
        return None;
    }
    root.attribute((XML_NS, "base"))
        .or_else(|| {
            root.namespaces()
                .find(|ns| ns.name() == Some("base"))
                .map(|ns| ns.uri())
        })
        .or_else(|| root.attribute("base"))
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
}

struct LinkResolver {
    base: Option<Url>,
}

impl LinkResolver {
    fn new(base: &str, source_url: &str) -> Self {
        let source = Url::parse(source_url).ok();
        let base = if base.is_empty() {
            source
        } else {
            Url::parse(base)
                .ok()
                .or_else(|| source.as_ref().and_then(|s| s.join(base).ok()))
                .or(source)
        };
        Self { base }
    }

    fn resolve(&self, link: &str) -> String {
        match self.base {
            Some(ref base) => base
                .join(link)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| link.to_string()),
            None => link.to_string(),
        }
    }
}

fn link_value(node: Node) -> Option<String> {
    let text = text_content(node).trim().to_string();
    if !text.is_empty() {
        return Some(text);
    }
    node.attribute("href")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

fn entry_link(node: Node, is_atom: bool) -> Option<String> {
    let links: Vec<Node> = node
        .descendants()
        .skip(1)
        .filter(|n| is_named(*n, &["link"]))
        .collect();
    // Atom links embedded in RSS/RDF usually point at the feed itself
    let foreign = |n: &Node| !is_atom && n.tag_name().namespace() == Some(ATOM_NS);

    let chosen = links
        .iter()
        .find(|n| n.attribute("rel") == Some("alternate"))
        .or_else(|| {
            links
                .iter()
                .find(|n| n.attribute("type") == Some("text/html") && !foreign(n))
        })
        .or_else(|| {
            links.iter().find(|n| {
                !foreign(n) && matches!(n.attribute("rel"), None | Some("alternate"))
            })
        })
        .or_else(|| links.iter().find(|n| !foreign(n)))
        .or_else(|| links.first());

    chosen.and_then(|n| link_value(*n)).or_else(|| {
        child_text(node, &["guid"]).filter(|guid| guid.contains("://"))
    })
}

fn entry_date(node: Node) -> i64 {
    let groups: [&[&str]; 3] = [
        &["pubDate", "published"],
        &["date"],
        &["lastBuildDate", "updated", "update"],
    ];
    for names in groups {
        if let Some(found) = find_descendant(node, names) {
            return entities::parse_date(&text_content(found));
        }
    }
    0
}

fn entry_author(node: Node) -> Option<String> {
    let named = node.descendants().skip(1).find(|n| {
        is_named(*n, &["creator"])
            || (is_named(*n, &["name"])
                && n.parent_element()
                    .map(|p| is_named(p, &["author"]))
                    .unwrap_or(false))
    });
    named
        .map(|n| text_content(n).trim().to_string())
        .filter(|a| !a.is_empty())
        .or_else(|| child_text(node, &["author"]))
}

fn has_element_children(node: Node) -> bool {
    node.children().any(|c| c.is_element())
}

/// Serialize the children of `node` back into markup
fn write_markup(node: Node, out: &mut String) {
    for edge in node.traverse() {
        match edge {
            Edge::Open(child) | Edge::Close(child) if child == node => {}
            Edge::Open(child) if child.is_text() => {
                out.push_str(&encode_text(child.text().unwrap_or_default()))
            }
            Edge::Open(child) if child.is_element() => {
                out.push('<');
                out.push_str(child.tag_name().name());
                for attr in child.attributes() {
                    out.push(' ');
                    out.push_str(attr.name());
                    out.push_str("=\"");
                    out.push_str(&encode_double_quoted_attribute(attr.value()));
                    out.push('"');
                }
                out.push('>');
            }
            Edge::Close(child) if child.is_element() => {
                out.push_str("</");
                out.push_str(child.tag_name().name());
                out.push('>');
            }
            _ => {}
        }
    }
}

fn raw_content(node: Node) -> Option<String> {
    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };

    find_descendant(node, &["encoded"])
        .and_then(|n| non_empty(text_content(n)))
        .or_else(|| find_descendant(node, &["description"]).and_then(|n| non_empty(text_content(n))))
        .or_else(|| {
            find_descendant(node, &["content"]).and_then(|n| {
                if has_element_children(n) {
                    let mut markup = String::new();
                    write_markup(n, &mut markup);
                    non_empty(markup)
                } else {
                    non_empty(text_content(n))
                }
            })
        })
        .or_else(|| find_descendant(node, &["summary"]).and_then(|n| non_empty(text_content(n))))
}

/// Audio/video player for podcast enclosures
fn enclosure_player(node: Node) -> Option<String> {
    let media = node.descendants().skip(1).find(|n| {
        n.is_element()
            && (is_named(*n, &["enclosure"]) || n.attribute("rel") == Some("enclosure"))
    })?;
    let src = media
        .attribute("url")
        .or_else(|| media.attribute("href"))
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let kind = media.attribute("type").unwrap_or_default();
    if !AUDIO_OR_VIDEO.is_match(kind) && !MEDIA_EXTENSION.is_match(src) {
        return None;
    }

    let tag = if kind.to_ascii_lowercase().contains("video") {
        "video"
    } else {
        "audio"
    };
    let mut player = format!(
        "<{tag} controls preload=\"none\" src=\"{}\"",
        encode_double_quoted_attribute(src)
    );
    if !kind.is_empty() {
        player.push_str(&format!(" type=\"{}\"", encode_double_quoted_attribute(kind)));
    }
    player.push_str(&format!("></{tag}>"));
    Some(player)
}

fn entry_content(node: Node) -> String {
    let content = raw_content(node)
        .map(|c| sanitize_fragment(&c))
        .filter(|c| !c.is_empty());
    let player = enclosure_player(node);

    match (player, content) {
        (Some(player), Some(content)) => player + &content,
        (Some(player), None) => player,
        (None, Some(content)) => content,
        (None, None) => EMPTY_CONTENT.to_string(),
    }
}

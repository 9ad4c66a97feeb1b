//! Regexes, tag tables and thresholds used by the scorer.

use once_cell::sync::Lazy;
use regex::Regex;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid readability regex")
}

pub const SCORE_CHARS_IN_PARAGRAPH: usize = 100;
pub const GRANDPARENT_SCORE_DIVISOR: f64 = 2.0;
pub const MIN_PARAGRAPH_LENGTH: usize = 20;
pub const MIN_NODE_LENGTH: usize = 80;
pub const MAX_LINK_DENSITY: f64 = 0.25;
pub const SIBLING_SCORE_MULTIPLIER: f64 = 0.2;
/// A scanned link must score above this to be reported as the next page
pub const NEXT_PAGE_THRESHOLD: i64 = 49;

pub const TAGS_TO_REMOVE: &[&str] = &[
    "aside", "time", "applet", "footer", "head", "label", "nav", "noscript", "script", "select",
    "style", "textarea", "button",
];

pub const TAG_WEIGHTS: &[(&str, f64)] = &[
    ("address", -3.0),
    ("article", 30.0),
    ("blockquote", 3.0),
    ("body", -5.0),
    ("code", 4.0),
    ("canvas", 3.0),
    ("dd", -3.0),
    ("div", 5.0),
    ("dl", -3.0),
    ("dt", -3.0),
    ("figure", 5.0),
    ("footer", -3.0),
    ("form", -4.0),
    ("h2", -5.0),
    ("h3", -5.0),
    ("h4", -4.0),
    ("h5", -3.0),
    ("h6", -3.0),
    ("header", -4.0),
    ("hgroup", -5.0),
    ("li", -3.0),
    ("ol", -3.0),
    ("pre", 3.0),
    ("section", 15.0),
    ("td", 3.0),
    ("th", -5.0),
    ("ul", -3.0),
];

pub const REMOVE_IF_EMPTY: &[&str] = &[
    "blockquote", "a", "li", "p", "pre", "tbody", "td", "th", "thead", "tr",
];

pub const EMBEDS: &[&str] = &["embed", "object", "iframe", "audio", "video", "source", "param"];

pub const GOOD_ATTRIBUTES: &[&str] = &[
    "lang",
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

pub const CLEAN_CONDITIONALLY: &[&str] = &["div", "form", "ol", "table", "ul"];

/// Children a lone-child div is replaced by
pub const UNPACK_DIVS: &[&str] = &[
    "div", "img", "svg", "figure", "p", "embed", "object", "iframe", "audio", "video", "source",
    "param",
];

/// Tags whose content flows into the parent element
pub const TRANSPARENT_TAGS: &[&str] = &["font", "input", "link", "meta", "span", "path", "source"];

/// Leaf nodes kept for formatting
pub const FORMAT_TAGS: &[&str] = &["br", "hr"];

pub const HEADER_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

pub const NEW_LINES_AFTER: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "br", "li", "p"];

/// A div containing any of these is not treated as a paragraph
pub const DIV_TO_P_ELEMENTS: &[&str] = &[
    "a", "blockquote", "dl", "img", "svg", "ol", "p", "pre", "code", "table", "ul",
];

pub const OKAY_IF_EMPTY: &[&str] = &["source", "path", "embed", "iframe", "img", "object", "canvas"];

pub const VOID_TAGS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "param", "source", "track", "wbr",
];

pub static VIDEOS: Lazy<Regex> = Lazy::new(|| {
    re(r"//(?:[^.?/]+\.)?(?:youtu(?:be)?|soundcloud|vimeo|imgur|gfycat|dailymotion|twitch|vid|twitvid|rutube|viddler)\.(?:com|me|be|org|net|tv|ru)")
});
pub static MEDIA_FILE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\.(?:ogg|mp4|webm|wav|aac|opus|mp3|flac|ogm|fla)(?:[?#]|$)"));

pub static NEXT_LINK: Lazy<Regex> = Lazy::new(|| re(r"(?i)[>»]|continue|next|more|weiter(?:[^|]|$)"));
pub static PREV_LINK: Lazy<Regex> = Lazy::new(|| re(r"(?i)[<«]|earl|new|old|prev"));
pub static EXTRANEOUS: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)\bprint|archive|comment|discuss|e?-?mail|share|reply|sign|single|utility")
});
pub static PAGES: Lazy<Regex> = Lazy::new(|| re(r"(?i)pag(?:e|ing|inat)"));
pub static PAGE_NUMBER: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)p[ag]{0,2}(?:e|er|inator|ing|ination)?[=/]\d{1,2}"));

pub static SAFE: Lazy<Regex> =
    Lazy::new(|| re(r"hentry|(?:instapaper|article).body|markdown|\bfulltext"));
pub static FINAL: Lazy<Regex> = Lazy::new(|| re(r"(?i)first|last"));

pub static POSITIVE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)read|full|article|source|content|body|\bcontent|contain|\bentry|main|page|attach|post|text|blog|story")
});
pub static NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)pag(?:er|ination)|\bdate|\btime|nav|tag|extra|keyword|foot(?:note)?|^hid$|hid$|\bhid\b|^hid|all|bottom|stat|info|modal|outbrain|masthead|com-|contact|_nav|link|media|\bout|skyscraper|promo|\bad-|related|scroll|shoutbox|sponsor|shopping|teaser")
});
pub static UNLIKELY_CANDIDATES: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)auth?or|similar|ignore|\binfo|annoy|clock|\bdate|\btime|footer|com(?:bx|ment|munity)|banner|intro|log.{2}n|edcolinks|hidd?e|about|bookmark|\bcat|search|social|robot|published|masthead|subscri|category|disqus|extra|head(?:er|note)|floor|agegate|menu|function|remark|rss|tool|header|teaserlist|widget|meta|adsense|inner-?ad|ad-|\badv\b|\bads\b|agr?egate?|pager|sidebar|popup|tweet|twit|like")
});
pub static MAYBE_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)and|out(?:er|side)|wrap|post|article\b|body|entry|\bmain|page|contain|\bcontent|column|general|detail|shadow|lightbox|blog")
});

pub static SENTENCE: Lazy<Regex> = Lazy::new(|| re(r"\. |\.$"));
pub static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));
pub static COMMAS: Lazy<Regex> = Lazy::new(|| re(r",[\s,]*"));
pub static DIGITS: Lazy<Regex> = Lazy::new(|| re(r"\d"));

pub static PAGE_IN_URL: Lazy<Regex> = Lazy::new(|| re(r"[_-]?p[a-zA-Z]*[_-]?\d{1,2}$"));
pub static BAD_FIRST: Lazy<Regex> = Lazy::new(|| re(r"(?i)^(?:[^a-z]{0,3}|index|\d+)$"));
pub static NO_LETTERS: Lazy<Regex> = Lazy::new(|| re(r"[^a-zA-Z]"));
pub static PARAMS: Lazy<Regex> = Lazy::new(|| re(r"\?.*"));
pub static EXTENSION: Lazy<Regex> = Lazy::new(|| re(r"00,|\.[a-zA-Z]+$"));
pub static JUST_DIGITS: Lazy<Regex> = Lazy::new(|| re(r"^\d{1,2}$"));
pub static SLASHES: Lazy<Regex> = Lazy::new(|| re(r"/+"));
pub static DOMAIN: Lazy<Regex> = Lazy::new(|| re(r"/([^/]+)"));
pub static PROTOCOL: Lazy<Regex> = Lazy::new(|| re(r"\w+://"));

pub static JS_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| re(r"(?i)javascript\s*:"));
pub static CLOSING: Lazy<Regex> = Lazy::new(|| re(r"/?(?:#.*)?$"));
pub static IMG_URL: Lazy<Regex> = Lazy::new(|| re(r"(?i)\.(?:gif|jpe?g|a?png|webp|svg)"));

pub static BREAKS_BEFORE_P: Lazy<Regex> = Lazy::new(|| re(r"(?:<br/>(?:\s|&nbsp;?)*)+(</?p)"));
pub static SPACES_BEFORE_BR: Lazy<Regex> = Lazy::new(|| re(r"(?:\s|&nbsp;?)+(<br/>)"));
pub static DOUBLE_BREAKS: Lazy<Regex> = Lazy::new(|| re(r"(?:<br/>){2,}"));
pub static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| re(r"\s{2,}"));
pub static BLANK_LINES: Lazy<Regex> = Lazy::new(|| re(r"\n{3,}"));

pub static TITLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| re(r" [|\-»] "));
pub static TITLE_BEFORE_LAST_SEPARATOR: Lazy<Regex> = Lazy::new(|| re(r"(.*) [|\-»] .*"));
pub static TITLE_AFTER_FIRST_SEPARATOR: Lazy<Regex> = Lazy::new(|| re(r"[^|\-»]*[|\-»](.*)"));

pub fn tag_weight(tag: &str) -> f64 {
    TAG_WEIGHTS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, weight)| *weight)
        .unwrap_or(0.0)
}

/// Leading integer of `text` the way lenient HTML attribute parsing reads
/// it: optional whitespace and sign, then digits.
pub fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().map(|n| sign * n)
}

/// Number of space-separated parts, counting empty ones like `split(' ')`
pub fn word_parts(text: &str) -> usize {
    text.split(' ').count()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int("300px"), Some(300));
        assert_eq!(leading_int(" 12 "), Some(12));
        assert_eq!(leading_int("-4"), Some(-4));
        assert_eq!(leading_int("auto"), None);
    }

    #[test]
    fn test_class_buckets() {
        assert!(SAFE.is_match("hentry"));
        assert!(NEGATIVE.is_match("sidebar-promo"));
        assert!(POSITIVE.is_match("article-content"));
        assert!(UNLIKELY_CANDIDATES.is_match("comment-list"));
        assert!(MAYBE_CANDIDATE.is_match("main-column"));
    }

    #[test]
    fn test_video_hosts() {
        assert!(VIDEOS.is_match("https://www.youtube.com/embed/xyz"));
        assert!(VIDEOS.is_match("//player.vimeo.com/video/1"));
        assert!(!VIDEOS.is_match("https://ads.example.com/frame"));
        assert!(MEDIA_FILE.is_match("https://cdn.example.com/a.mp4?x=1"));
    }

    #[test]
    fn test_tag_weight() {
        assert_eq!(tag_weight("article"), 30.0);
        assert_eq!(tag_weight("span"), 0.0);
    }
}

//! Entry-level normalization: dates, titles, authors and stable ids.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

pub const NO_TITLE: &str = "<no title>";
pub const NO_AUTHOR: &str = "<no author>";

const TZ_OFFSETS: &[(&str, &str)] = &[
    ("CEST", "+0200"),
    ("CET", "+0100"),
    ("WEST", "+0100"),
    ("WET", "+0000"),
    ("WEZ", "+0000"),
    ("EEST", "+0300"),
    ("EET", "+0200"),
    ("BST", "+0100"),
    ("IST", "+0100"),
    ("KUYT", "+0400"),
    ("MSD", "+0400"),
    ("MSK", "+0400"),
    ("SAMT", "+0400"),
];

static TZ_ABBR: Lazy<Regex> = Lazy::new(|| {
    let names: Vec<&str> = TZ_OFFSETS.iter().map(|(name, _)| *name).collect();
    Regex::new(&format!(r"(?i)\b({})\b", names.join("|"))).expect("valid tz regex")
});

static MAILBOX_AUTHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+\s+\((.+)\)$").expect("valid author regex"));

static EMPTY_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(\)\s*$").expect("valid parens regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// SHA-256 over the concatenation of `parts`, hex encoded.
pub fn hash_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Stable id of a feed entry.
///
/// `seed` is the guid, or the resolved link when there is no guid. Without a
/// seed the title and the parsed date are hashed instead, so `date` must be
/// the value before it is defaulted to the fetch time.
pub fn entry_id(source_id: &str, seed: Option<&str>, title: &str, date: i64) -> String {
    match seed.filter(|s| !s.is_empty()) {
        Some(seed) => hash_hex(&[source_id, seed]),
        None => hash_hex(&[source_id, title, &date.to_string()]),
    }
}

/// Replace timezone abbreviations the RFC 2822 parser does not know with
/// numeric offsets.
pub fn replace_tz_abbreviations(raw: &str) -> String {
    TZ_ABBR
        .replace_all(raw, |caps: &regex::Captures| {
            let found = caps[1].to_ascii_uppercase();
            TZ_OFFSETS
                .iter()
                .find(|(name, _)| *name == found)
                .map(|(_, offset)| (*offset).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parse a feed date into epoch milliseconds, 0 when unparsable.
pub fn parse_date(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let value = replace_tz_abbreviations(trimmed);
    let value = value.as_str();

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return dt.timestamp_millis();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.timestamp_millis();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return dt.timestamp_millis();
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return dt.and_utc().timestamp_millis();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return dt.and_utc().timestamp_millis();
        }
    }
    0
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

pub fn clean_title(raw: &str) -> String {
    let title = collapse_whitespace(&decode_html_entities(raw));
    if title.is_empty() {
        NO_TITLE.to_string()
    } else {
        title
    }
}

/// Normalize an entry author, falling back to the feed title.
pub fn clean_author(raw: Option<&str>, feed_title: &str) -> String {
    let mut author = raw
        .map(|a| collapse_whitespace(&decode_html_entities(a)))
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| feed_title.trim().to_string());

    if author.is_empty() {
        return NO_AUTHOR.to_string();
    }
    if let Some(caps) = MAILBOX_AUTHOR.captures(&author) {
        author = caps[1].to_string();
    }
    let author = EMPTY_PARENS.replace(&author, "").into_owned();
    if author.is_empty() {
        NO_AUTHOR.to_string()
    } else {
        author
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_hex(&["abc"]),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_hex(&["a", "bc"]), hash_hex(&["abc"]));
    }

    #[test]
    fn test_entry_id_prefers_seed() {
        assert_eq!(entry_id("s1", Some("abc"), "T", 5), hash_hex(&["s1abc"]));
        assert_eq!(entry_id("s1", None, "T", 5), hash_hex(&["s1T5"]));
        assert_eq!(entry_id("s1", None, "T", 0), hash_hex(&["s1T0"]));
    }

    #[test]
    fn test_replace_tz_abbreviations() {
        assert_eq!(
            replace_tz_abbreviations("Mon, 01 Jan 2024 10:00:00 CEST"),
            "Mon, 01 Jan 2024 10:00:00 +0200"
        );
        assert_eq!(replace_tz_abbreviations("10:00 cet"), "10:00 +0100");
        // Words containing an abbreviation are left alone
        assert_eq!(replace_tz_abbreviations("SECETA"), "SECETA");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = 1_704_067_200_000;
        assert_eq!(parse_date("Mon, 01 Jan 2024 00:00:00 GMT"), expected);
        assert_eq!(parse_date("Mon, 01 Jan 2024 01:00:00 CET"), expected);
        assert_eq!(parse_date("2024-01-01T00:00:00Z"), expected);
        assert_eq!(parse_date("2024-01-01T02:00:00+02:00"), expected);
        assert_eq!(parse_date("2024-01-01 00:00:00"), expected);
        assert_eq!(parse_date("2024-01-01"), expected);
        assert_eq!(parse_date("Sun, 31 Dec 2023 19:00:00 EST"), expected);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date(""), 0);
        assert_eq!(parse_date("yesterday"), 0);
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  Tom &amp;  Jerry\n"), "Tom & Jerry");
        assert_eq!(clean_title("   "), NO_TITLE);
    }

    #[test]
    fn test_clean_author() {
        assert_eq!(clean_author(Some("john@example.com (John Doe)"), "Feed"), "John Doe");
        assert_eq!(clean_author(Some("Jane ()"), "Feed"), "Jane");
        assert_eq!(clean_author(None, "Feed"), "Feed");
        assert_eq!(clean_author(Some("  "), ""), NO_AUTHOR);
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default refresh interval for new sources, in minutes
pub const DEFAULT_UPDATE_EVERY: i64 = 180;

/// URL used by placeholder sources that must never be fetched
pub const PLACEHOLDER_URL: &str = "0.0.0.0";

/// How the article page linked from each entry is turned into content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FulltextMode {
    /// Keep the feed-provided summary
    #[default]
    Disabled,
    /// Apply a CSS selector to the article page
    Selector,
    /// Run the readability scorer on the article page
    Heuristic,
}

impl TryFrom<u8> for FulltextMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FulltextMode::Disabled),
            1 => Ok(FulltextMode::Selector),
            2 => Ok(FulltextMode::Heuristic),
            other => Err(format!("Invalid full-text mode: {}", other)),
        }
    }
}

impl From<FulltextMode> for u8 {
    fn from(mode: FulltextMode) -> Self {
        match mode {
            FulltextMode::Disabled => 0,
            FulltextMode::Selector => 1,
            FulltextMode::Heuristic => 2,
        }
    }
}

impl FulltextMode {
    pub fn is_enabled(self) -> bool {
        self != FulltextMode::Disabled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    /// Raw stored value, possibly in the legacy `enc:` form
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Plain-text password. Values prefixed with `enc:` were stored with
    /// every character shifted by 13 code points.
    pub fn password(&self) -> String {
        match self.password.strip_prefix("enc:") {
            Some(encoded) => encoded
                .chars()
                .filter_map(|c| char::from_u32((c as u32).wrapping_sub(13)))
                .collect(),
            None => self.password.clone(),
        }
    }

    /// Encode a plain-text password into the legacy stored form
    pub fn encode_password(plain: &str) -> String {
        if plain.is_empty() {
            return String::new();
        }
        let mut encoded = String::from("enc:");
        encoded.extend(plain.chars().filter_map(|c| char::from_u32(c as u32 + 13)));
        encoded
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Base URL declared by the feed document, empty if none
    pub base: String,
    /// Refresh interval in minutes; -1 disables, 0 means manual only
    pub update_every: i64,
    /// Epoch ms of the last successful update, 0 if never
    pub last_update: i64,
    /// Epoch ms of the last attempt, successful or not
    pub last_attempt: i64,
    pub fulltext: FulltextMode,
    pub fulltext_position: String,
    pub credentials: Option<Credentials>,
    /// Retention for unpinned items in days, 0 keeps them forever
    pub autoremove: i64,
    pub folder_id: Option<String>,
    pub favicon: Option<String>,
    pub count: i64,
    pub count_all: i64,
    pub has_new: bool,
    pub last_update_failed: bool,
}

impl Source {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            title: url.clone(),
            url,
            base: String::new(),
            update_every: DEFAULT_UPDATE_EVERY,
            last_update: 0,
            last_attempt: 0,
            fulltext: FulltextMode::Disabled,
            fulltext_position: String::new(),
            credentials: None,
            autoremove: 0,
            folder_id: None,
            favicon: None,
            count: 0,
            count_all: 0,
            has_new: false,
            last_update_failed: false,
        }
    }

    /// Create a source with an id derived from the current time
    pub fn with_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let id = crate::normalizer::entities::hash_hex(&[
            url.as_str(),
            &Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string(),
        ]);
        Self::new(id[..16].to_string(), url)
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.url.trim().is_empty() || self.url == PLACEHOLDER_URL
    }

    pub fn is_disabled(&self) -> bool {
        self.update_every < 0
    }

    /// Whether the refresh interval has elapsed at `now_ms`, tolerating
    /// `skew_ms` of scheduler jitter.
    pub fn is_due(&self, now_ms: i64, skew_ms: i64) -> bool {
        if self.update_every <= 0 {
            return false;
        }
        let last = self.last_update.max(self.last_attempt);
        if last == 0 {
            return true;
        }
        last + self.update_every * 60_000 <= now_ms + skew_ms
    }

    /// Whether the stored title is only the URL placeholder
    pub fn has_placeholder_title(&self) -> bool {
        self.title.is_empty() || self.title == self.url
    }
}

/// Partial update of a [`Source`]; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceUpdate {
    pub title: Option<String>,
    pub base: Option<String>,
    pub update_every: Option<i64>,
    pub last_update: Option<i64>,
    pub last_attempt: Option<i64>,
    pub favicon: Option<String>,
    pub count: Option<i64>,
    pub count_all: Option<i64>,
    pub has_new: Option<bool>,
    pub last_update_failed: Option<bool>,
}

impl SourceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SourceUpdate::default()
    }

    pub fn apply(&self, source: &mut Source) {
        if let Some(ref title) = self.title {
            source.title = title.clone();
        }
        if let Some(ref base) = self.base {
            source.base = base.clone();
        }
        if let Some(update_every) = self.update_every {
            source.update_every = update_every;
        }
        if let Some(last_update) = self.last_update {
            source.last_update = last_update;
        }
        if let Some(last_attempt) = self.last_attempt {
            source.last_attempt = last_attempt;
        }
        if let Some(ref favicon) = self.favicon {
            source.favicon = Some(favicon.clone());
        }
        if let Some(count) = self.count {
            source.count = count;
        }
        if let Some(count_all) = self.count_all {
            source.count_all = count_all;
        }
        if let Some(has_new) = self.has_new {
            source.has_new = has_new;
        }
        if let Some(failed) = self.last_update_failed {
            source.last_update_failed = failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulltext_mode_round_trips_through_u8() {
        assert_eq!(FulltextMode::try_from(2).unwrap(), FulltextMode::Heuristic);
        assert_eq!(u8::from(FulltextMode::Selector), 1);
        assert!(FulltextMode::try_from(3).is_err());
    }

    #[test]
    fn test_legacy_password_decoding() {
        let encoded = Credentials::encode_password("secret");
        assert!(encoded.starts_with("enc:"));
        let creds = Credentials::new("me", encoded);
        assert_eq!(creds.password(), "secret");

        let plain = Credentials::new("me", "plain");
        assert_eq!(plain.password(), "plain");
    }

    #[test]
    fn test_is_due() {
        let now = 10_000_000_000;
        let mut source = Source::new("s1", "https://example.com/feed.xml");
        assert!(source.is_due(now, 0));

        source.update_every = 60;
        source.last_update = now - 30 * 60_000;
        assert!(!source.is_due(now, 0));

        source.last_update = now - 60 * 60_000 + 5_000;
        assert!(!source.is_due(now, 0));
        assert!(source.is_due(now, 10_000));

        source.update_every = 0;
        source.last_update = 0;
        assert!(!source.is_due(now, 0));
    }

    #[test]
    fn test_failed_attempt_throttles() {
        let now = 10_000_000_000;
        let mut source = Source::new("s1", "https://example.com/feed.xml");
        source.update_every = 60;
        source.last_attempt = now - 60_000;
        assert!(!source.is_due(now, 0));
    }

    #[test]
    fn test_placeholder() {
        assert!(Source::new("joker", PLACEHOLDER_URL).is_placeholder());
        assert!(Source::new("empty", " ").is_placeholder());
        assert!(!Source::new("s", "https://example.com").is_placeholder());
    }

    #[test]
    fn test_update_apply_is_partial() {
        let mut source = Source::new("s1", "https://example.com/feed.xml");
        let update = SourceUpdate {
            title: Some("Example".into()),
            update_every: Some(60),
            ..Default::default()
        };
        update.apply(&mut source);
        assert_eq!(source.title, "Example");
        assert_eq!(source.update_every, 60);
        assert_eq!(source.url, "https://example.com/feed.xml");
        assert!(SourceUpdate::default().is_empty());
    }
}

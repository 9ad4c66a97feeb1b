use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sound value that silences notifications
pub const NO_SOUND: &str = ":none";

/// Configuration for feed downloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Feed request timeout in milliseconds (default: 5000)
    pub rss_timeout_ms: u64,

    /// Article page request timeout in milliseconds (default: 7000)
    pub html_timeout_ms: u64,

    /// Article pages fetched at once per feed (default: 7)
    pub num_parallel: usize,

    /// Ask for a sound when a run brings new items (default: false)
    pub sound_notifications: bool,

    /// Sound to play: `:user`, `:none` or a named sound (default: ":user")
    pub use_sound: String,

    /// Days a deleted item is remembered after leaving its feed (default: 3)
    pub deleted_retention_days: i64,

    /// Look up favicons for sources without one (default: true)
    pub fetch_favicons: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            rss_timeout_ms: 5000,
            html_timeout_ms: 7000,
            num_parallel: 7,
            sound_notifications: false,
            use_sound: ":user".to_string(),
            deleted_retention_days: 3,
            fetch_favicons: true,
        }
    }
}

impl LoaderSettings {
    pub fn rss_timeout(&self) -> Duration {
        Duration::from_millis(self.rss_timeout_ms)
    }

    pub fn html_timeout(&self) -> Duration {
        Duration::from_millis(self.html_timeout_ms)
    }

    /// Chunk size of article fetches, never zero
    pub fn parallelism(&self) -> usize {
        self.num_parallel.max(1)
    }

    pub fn deleted_retention_ms(&self) -> i64 {
        self.deleted_retention_days * 24 * 60 * 60 * 1000
    }

    /// Whether a run that brought new items should play a sound
    pub fn plays_sound(&self) -> bool {
        self.sound_notifications && self.use_sound != NO_SOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LoaderSettings::default();
        assert_eq!(settings.rss_timeout(), Duration::from_millis(5000));
        assert_eq!(settings.html_timeout(), Duration::from_millis(7000));
        assert_eq!(settings.parallelism(), 7);
        assert_eq!(settings.deleted_retention_ms(), 3 * 86_400_000);
        assert!(!settings.plays_sound());
    }

    #[test]
    fn test_sound() {
        let mut settings = LoaderSettings {
            sound_notifications: true,
            ..Default::default()
        };
        assert!(settings.plays_sound());
        settings.use_sound = NO_SOUND.to_string();
        assert!(!settings.plays_sound());
    }

    #[test]
    fn test_zero_parallelism_is_clamped() {
        let settings = LoaderSettings {
            num_parallel: 0,
            ..Default::default()
        };
        assert_eq!(settings.parallelism(), 1);
    }
}

//! Configuration management for smartrss.
//!
//! Configuration is read from `~/.config/smartrss/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::extractor::ExtractorConfig;
use crate::loader::LoaderSettings;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file, `~/.local/share/smartrss/smartrss.db` when unset
    pub database_path: Option<PathBuf>,
    pub loader: LoaderSettings,
    pub extractor: ExtractorConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            Self::create_default_config(config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/smartrss/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("smartrss").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# smartrss configuration

# Database file (default: platform data dir / smartrss / smartrss.db)
# database_path = "/path/to/smartrss.db"

[loader]
# Feed request timeout (milliseconds)
rss_timeout_ms = 5000

# Article page request timeout (milliseconds)
html_timeout_ms = 7000

# Article pages fetched at once for full-text sources
num_parallel = 7

# Request a notification sound when new items arrive
sound_notifications = false

# Sound to use: ":user", ":none" or a sound name
use_sound = ":user"

# Days a deleted item is remembered after it leaves its feed
deleted_retention_days = 3

# Look up favicons for new sources
fetch_favicons = true

[extractor]
# Minimum text length for an extraction to be accepted
min_text_length = 140

# Selector used when a source has none
default_selector = "body > *:not(footer):not(nav):not(script):not(style):not(header):not(form):not(aside):not(menu)"

# SITEINFO-style JSON file with site rules
# siteinfo_path = "/path/to/siteinfo.json"

# Site rules, tried before the heuristic scorer
# [[extractor.site_rules]]
# url = '^https?://example\.com/'
# selector = ".article-body"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[loader]
num_parallel = 3

[[extractor.site_rules]]
url = '^https://example\.com/'
selector = "#story"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        // Custom value
        assert_eq!(config.loader.num_parallel, 3);
        assert_eq!(config.extractor.site_rules.len(), 1);
        // Default value
        assert_eq!(config.loader.rss_timeout_ms, 5000);
        assert_eq!(config.extractor.min_text_length, 140);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smartrss").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        fs::write(&path, "[loader]\nnum_parallel = \"many\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}

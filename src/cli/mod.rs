pub mod commands;

use clap::{Parser, Subcommand};

use crate::domain::{FulltextMode, DEFAULT_UPDATE_EVERY};

#[derive(Parser)]
#[command(name = "smartrss")]
#[command(about = "An RSS/Atom/RDF reader with full-text extraction", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default one
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new source and download it
    Add {
        /// URL of the feed to add
        url: String,

        /// Full-text mode: 0 keeps summaries, 1 applies a selector, 2 uses the scorer
        #[arg(long, default_value_t = 0, value_parser = parse_mode)]
        fulltext: u8,

        /// CSS selector for full-text mode 1
        #[arg(long)]
        selector: Option<String>,

        /// Refresh interval in minutes (0 = manual only, -1 = disabled)
        #[arg(long, default_value_t = DEFAULT_UPDATE_EVERY, allow_negative_numbers = true)]
        update_every: i64,

        /// Folder id to file the source under
        #[arg(long)]
        folder: Option<String>,
    },
    /// Remove a source and its items
    Remove {
        /// URL of the feed to remove
        url: String,
    },
    /// Download due sources
    Update {
        /// Download every source, due or not
        #[arg(long)]
        force: bool,
    },
    /// List sources or items
    List {
        /// Show items instead of sources
        #[arg(long)]
        items: bool,
    },
    /// Fetch a page and print its extracted content
    Extract {
        /// URL of the article page
        url: String,

        /// Extraction mode: 1 applies a selector, 2 uses the scorer
        #[arg(long, default_value_t = 2, value_parser = parse_mode)]
        mode: u8,

        /// CSS selector for mode 1
        #[arg(long)]
        selector: Option<String>,
    },
    /// Keep downloading due sources in the foreground
    Daemon {
        /// How often due sources are checked (e.g., "30s", "1m", "1h")
        #[arg(short, long, default_value = "1m")]
        tick: String,
    },
}

fn parse_mode(raw: &str) -> Result<u8, String> {
    let value: u8 = raw.parse().map_err(|_| format!("Invalid mode: {}", raw))?;
    FulltextMode::try_from(value).map(u8::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cli = Cli::parse_from([
            "smartrss",
            "add",
            "https://example.com/feed.xml",
            "--fulltext",
            "1",
            "--selector",
            "article",
            "--update-every",
            "-1",
        ]);
        match cli.command {
            Commands::Add {
                url,
                fulltext,
                selector,
                update_every,
                folder,
            } => {
                assert_eq!(url, "https://example.com/feed.xml");
                assert_eq!(fulltext, 1);
                assert_eq!(selector.as_deref(), Some("article"));
                assert_eq!(update_every, -1);
                assert!(folder.is_none());
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        assert!(Cli::try_parse_from(["smartrss", "extract", "https://x", "--mode", "5"]).is_err());
    }

    #[test]
    fn test_daemon_default_tick() {
        let cli = Cli::parse_from(["smartrss", "daemon"]);
        assert!(matches!(cli.command, Commands::Daemon { ref tick } if tick == "1m"));
    }
}

//! # SmartRSS
//!
//! A feed reader core that downloads RSS/Atom/RDF sources and can replace
//! summaries with the full text of the linked article.
//!
//! ## Architecture
//!
//! ```text
//! Loader → Fetcher → FeedParser → Store
//!              ↘ ContentExtractor (selector | readability)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a source with scored full-text extraction
//! smartrss add https://blog.rust-lang.org/feed.xml --fulltext 2
//!
//! # Download due sources
//! smartrss update
//!
//! # Try the extractor on a single page
//! smartrss extract https://example.com/article
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// fetcher, extractor and loader.
pub mod app;

/// Configuration loaded from `~/.config/smartrss/config.toml`.
pub mod config;

/// Foreground scheduler that downloads due sources on a fixed tick.
pub mod daemon;

/// Command-line interface using clap.
///
/// - `add <url>` - Add a source and download it
/// - `remove <url>` - Remove a source and its items
/// - `update [--force]` - Download due sources
/// - `list [--items]` - List sources or items
/// - `extract <url>` - Print the extracted content of a page
/// - `daemon` - Keep downloading in the foreground
pub mod cli;

/// Core domain models.
///
/// - [`Source`](domain::Source): a subscribed feed and its schedule
/// - [`Item`](domain::Item): an entry with a deterministic id
/// - [`Node`](domain::Node): a source or a folder of sources
pub mod domain;

/// Full-text extraction from article pages.
pub mod extractor;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for document fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Download queue, scheduling and reconciliation.
pub mod loader;

/// Feed parsing, entity decoding and HTML sanitizing.
pub mod normalizer;

/// Readability-style content scoring.
pub mod readability;

/// Persistence.
///
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
/// - [`MemoryStore`](store::MemoryStore): in-memory implementation
pub mod store;

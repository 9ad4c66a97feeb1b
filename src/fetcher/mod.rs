pub mod http_fetcher;

pub use http_fetcher::HttpFetcher;

use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Credentials;

/// Default timeout of feed requests
pub const RSS_TIMEOUT: Duration = Duration::from_millis(5000);
/// Default timeout of article page requests
pub const HTML_TIMEOUT: Duration = Duration::from_millis(7000);

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    /// Sent as HTTP basic auth when present
    pub credentials: Option<Credentials>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials.filter(|c| !c.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: String,
}

impl FetchedDocument {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|t| t.contains("image"))
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument>;
}

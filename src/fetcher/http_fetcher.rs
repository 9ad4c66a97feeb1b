use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::Client;
use tracing::debug;

use crate::app::{Result, SmartRssError};
use crate::fetcher::{FetchRequest, FetchedDocument, Fetcher};

pub const DEFAULT_USER_AGENT: &str = concat!("smartrss/", env!("CARGO_PKG_VERSION"));

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .map_err(|e| SmartRssError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn no_cache_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, post-check=0, pre-check=0"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        if let Ok(value) = HeaderValue::from_str(&chrono::Utc::now().timestamp_millis().to_string()) {
            headers.insert("X-Time-Stamp", value);
        }
        headers
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument> {
        let mut builder = self
            .client
            .get(&request.url)
            .headers(Self::no_cache_headers())
            .timeout(request.timeout);

        if let Some(ref credentials) = request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(credentials.password()));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(url = %request.url, %status, "Request failed");
            return Err(SmartRssError::Network(format!(
                "HTTP {} for {}",
                status, request.url
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();

        Ok(FetchedDocument {
            body,
            content_type,
            final_url,
        })
    }
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use smartrss::app::{Result, SmartRssError};
use smartrss::domain::Source;
use smartrss::extractor::ContentExtractor;
use smartrss::fetcher::{FetchRequest, FetchedDocument, Fetcher};
use smartrss::loader::{Loader, LoaderSettings};
use smartrss::store::MemoryStore;

pub const FEED_URL: &str = "https://news.example.com/feed.xml";

/// Fetcher answering from a fixed URL map. Unknown URLs fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, FetchedDocument>>,
    /// Delay applied to article pages
    delay: Option<Duration>,
    /// When set, article pages wait for this gate before answering
    gate: Option<Arc<Notify>>,
    /// Requests for this URL panic
    panic_url: Option<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicUsize,
    /// Article URLs with the number of article fetches completed when they started
    starts: Mutex<Vec<(String, usize)>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_panic(mut self, url: &str) -> Self {
        self.panic_url = Some(url.to_string());
        self
    }

    pub fn respond(self, url: &str, body: &str, content_type: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), document(url, body, content_type));
        self
    }

    pub fn set(&self, url: &str, body: &str, content_type: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), document(url, body, content_type));
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<(String, usize)> {
        self.starts.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn document(url: &str, body: &str, content_type: &str) -> FetchedDocument {
    FetchedDocument {
        body: body.as_bytes().to_vec(),
        content_type: Some(content_type.to_string()),
        final_url: url.to_string(),
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedDocument> {
        self.requests.lock().unwrap().push(request.url.clone());
        if self.panic_url.as_deref() == Some(request.url.as_str()) {
            panic!("fetcher crashed on {}", request.url);
        }
        let response = self.responses.lock().unwrap().get(&request.url).cloned();
        let Some(response) = response else {
            return Err(SmartRssError::Network(format!("HTTP 404 Not Found for {}", request.url)));
        };
        if request.url == FEED_URL {
            return Ok(response);
        }

        self.starts
            .lock()
            .unwrap()
            .push((request.url.clone(), self.completed.load(Ordering::SeqCst)));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref gate) = self.gate {
            gate.notified().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }
}

pub fn settings(num_parallel: usize) -> LoaderSettings {
    LoaderSettings {
        num_parallel,
        fetch_favicons: false,
        ..Default::default()
    }
}

pub fn loader(
    source: Source,
    fetcher: Arc<ScriptedFetcher>,
    settings: LoaderSettings,
) -> (Arc<MemoryStore>, Arc<Loader<MemoryStore>>) {
    let store = Arc::new(MemoryStore::with_sources([source]));
    let loader = Arc::new(Loader::new(
        store.clone(),
        fetcher,
        Arc::new(ContentExtractor::default()),
        settings,
    ));
    (store, loader)
}

pub fn article_url(n: usize) -> String {
    format!("https://news.example.com/articles/{}", n)
}

/// RSS feed with `count` entries linking to [`article_url`]
pub fn feed_with_articles(count: usize) -> String {
    let items: String = (0..count)
        .map(|n| {
            format!(
                "<item><title>Story {n}</title><link>{}</link><guid>story-{n}</guid>\
                 <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>\
                 <description>Summary {n}</description></item>",
                article_url(n)
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Example News</title>{}</channel></rss>"#,
        items
    )
}

pub fn article_page(n: usize) -> String {
    format!(
        "<html><head><title>Story {n}</title></head><body>\
         <nav><a href=\"/\">Home</a></nav>\
         <p>Full text of story {n}, long enough to be worth keeping.</p>\
         </body></html>"
    )
}

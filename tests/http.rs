use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smartrss::app::{AppContext, SmartRssError};
use smartrss::config::Config;
use smartrss::domain::{Credentials, FulltextMode, Node, Source};
use smartrss::fetcher::{FetchRequest, Fetcher, HttpFetcher};
use smartrss::store::{ItemStore, SourceStore};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_fetch_sends_no_cache_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("pragma", "no-cache"))
        .and(header_exists("x-time-stamp"))
        .and(header_exists("cache-control"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string("<rss/>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(None).unwrap();
    let url = format!("{}/feed.xml", server.uri());
    let document = fetcher.fetch(&FetchRequest::new(&url, TIMEOUT)).await.unwrap();

    assert_eq!(document.text(), "<rss/>");
    assert_eq!(document.content_type.as_deref(), Some("application/rss+xml"));
    assert_eq!(document.final_url, url);
    assert!(!document.is_image());
}

#[tokio::test]
async fn test_fetch_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.xml"))
        // base64("user:secret")
        .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(Some("smartrss-test")).unwrap();
    let request = FetchRequest::new(format!("{}/private.xml", server.uri()), TIMEOUT)
        .with_credentials(Some(Credentials::new("user", "secret")));
    let document = assert_ok!(fetcher.fetch(&request).await);

    assert_eq!(document.text(), "ok");
}

#[tokio::test]
async fn test_fetch_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(None).unwrap();
    let err = fetcher
        .fetch(&FetchRequest::new(format!("{}/gone", server.uri()), TIMEOUT))
        .await
        .unwrap_err();

    match err {
        SmartRssError::Network(message) => assert!(message.contains("404")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(None).unwrap();
    let request = FetchRequest::new(format!("{}/slow", server.uri()), Duration::from_millis(100));
    assert_err!(fetcher.fetch(&request).await);
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let server = MockServer::start().await;
    let feed = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Mock Blog</title>
  <entry>
    <id>urn:post:1</id>
    <title>First post</title>
    <link rel="alternate" href="{}/posts/1"/>
    <updated>2024-03-01T10:00:00Z</updated>
    <summary>Teaser</summary>
  </entry>
</feed>"#,
        server.uri()
    );
    let article = r#"<html><head><title>First post</title></head><body>
<div class="sidebar"><a href="/">Home</a> <a href="/about">About</a></div>
<div class="article">
<p>The first paragraph of the post explains what the post is about, with enough words, commas, and detail to look like real prose.</p>
<p>The second paragraph keeps going, adding more sentences, more commas, and more text so the scorer prefers this block over the sidebar.</p>
<p>A third paragraph closes the article with a final thought, again long enough to count as content for the readability scorer.</p>
</div>
</body></html>"#;

    Mock::given(method("GET"))
        .and(path("/atom.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/atom+xml")
                .set_body_string(feed),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(article),
        )
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.loader.fetch_favicons = false;
    let ctx = AppContext::in_memory(config).unwrap();

    let mut source = Source::new("mock", format!("{}/atom.xml", server.uri()));
    source.fulltext = FulltextMode::Heuristic;
    ctx.store.create_source(&source).unwrap();

    ctx.loader
        .download_feeds(vec![Node::Source(source.clone())], true)
        .unwrap();
    tokio::time::timeout(Duration::from_secs(10), ctx.loader.wait_idle())
        .await
        .unwrap();

    let stored = ctx.store.find_source("mock").unwrap().unwrap();
    assert_eq!(stored.title, "Mock Blog");
    assert!(!stored.last_update_failed);

    let items = ctx.store.items_of_source("mock").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "First post");
    assert!(items[0].content.contains("The second paragraph keeps going"));
    assert!(!items[0].content.contains("Teaser"));
}

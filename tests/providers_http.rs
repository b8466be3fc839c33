// tests/providers_http.rs
use feed_collector::config::FetchConfig;
use feed_collector::ingest::providers::rss::{build_client, RssProvider};
use feed_collector::ingest::types::{FeedSource, SourceProvider};
use std::fs;

fn client() -> reqwest::Client {
    let cfg = FetchConfig {
        timeout_secs: 5,
        ..FetchConfig::default()
    };
    build_client(&cfg).expect("client")
}

#[tokio::test]
async fn fetches_and_parses_over_http() {
    let mut server = mockito::Server::new_async().await;
    let xml = fs::read_to_string("tests/fixtures/espn_rss.xml").expect("fixture");
    let m = server
        .mock("GET", "/feed")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(xml)
        .expect(1)
        .create_async()
        .await;

    let src = FeedSource::new("ESPN", format!("{}/feed", server.url()));
    let p = RssProvider::from_http(src, client(), 2);
    let entries = p.fetch_entries().await.expect("ok");

    assert_eq!(entries.len(), 4);
    m.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/feed")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let src = FeedSource::new("Flaky", format!("{}/feed", server.url()));
    let p = RssProvider::from_http(src, client(), 2);
    let err = p.fetch_entries().await.expect_err("should fail");

    assert!(format!("{err:#}").contains("503"));
    m.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("GET", "/feed")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let src = FeedSource::new("Gone", format!("{}/feed", server.url()));
    let p = RssProvider::from_http(src, client(), 3);
    assert!(p.fetch_entries().await.is_err());
    m.assert_async().await;
}

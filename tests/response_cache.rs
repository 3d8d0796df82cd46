//! Integration tests for the response cache: the SQLite store on its own,
//! and the news service reading through it.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use std::time::Duration;

use newsroom::content::ArticleClient;
use newsroom::feed::HttpFetcher;
use newsroom::news::{
    Aggregator, AggregatorOptions, CancelToken, Category, FeedTable, ListNewsParams, NewsService,
    Provider,
};
use newsroom::storage::{Database, ResponseCache};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = r#"<rss version="2.0"><channel><title>BBC</title>
<item><title>Cached story</title><link>https://example.com/1</link>
<pubDate>Tue, 25 Jul 2023 08:00:00 GMT</pubDate></item>
</channel></rss>"#;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn service(server: &MockServer, db: Database) -> NewsService<HttpFetcher, Database> {
    let mut table = FeedTable::empty();
    table.insert(Provider::Bbc, Category::General, format!("{}/bbc.xml", server.uri()));
    let client = reqwest::Client::new();
    let aggregator = Aggregator::new(
        HttpFetcher::new(client.clone()),
        table,
        AggregatorOptions::default(),
    );
    let articles = ArticleClient::new(client).allow_private_hosts(true);
    NewsService::new(aggregator, articles, db).with_cache_ttl(Duration::from_secs(60))
}

// ============================================================================
// Store
// ============================================================================

#[tokio::test]
async fn test_store_and_read_back() {
    let db = test_db().await;
    db.put("k", "{\"news\":[]}", Duration::from_secs(60)).await.unwrap();

    assert_eq!(db.get("k").await.unwrap().as_deref(), Some("{\"news\":[]}"));
    assert_eq!(db.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_replace_keeps_one_entry() {
    let db = test_db().await;
    db.put("k", "old", Duration::from_secs(60)).await.unwrap();
    db.put("k", "new", Duration::from_secs(60)).await.unwrap();

    assert_eq!(db.get("k").await.unwrap().as_deref(), Some("new"));
    assert_eq!(db.cache_stats().await.unwrap().total_entries, 1);
}

#[tokio::test]
async fn test_expired_entries_hidden_then_evicted() {
    let db = test_db().await;
    db.put("stale", "x", Duration::ZERO).await.unwrap();
    db.put("fresh", "yy", Duration::from_secs(60)).await.unwrap();

    assert_eq!(db.get("stale").await.unwrap(), None);

    let stats = db.cache_stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.expired_entries, 1);
    assert_eq!(stats.total_size_bytes, 3);

    assert_eq!(db.evict_expired().await.unwrap(), 1);
    let stats = db.cache_stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.expired_entries, 0);
}

// ============================================================================
// Read-through
// ============================================================================

#[tokio::test]
async fn test_repeat_request_served_from_database() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bbc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .expect(1)
        .mount(&server)
        .await;

    let db = test_db().await;
    let svc = service(&server, db.clone());
    let never = CancelToken::never();

    let first = svc.list_news(&ListNewsParams::default(), &never).await.unwrap();
    let second = svc.list_news(&ListNewsParams::default(), &never).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.news[0].title, "Cached story");
    assert_eq!(db.cache_stats().await.unwrap().total_entries, 1);
}

#[tokio::test]
async fn test_failed_request_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bbc.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = test_db().await;
    let svc = service(&server, db.clone());

    assert!(svc
        .list_news(&ListNewsParams::default(), &CancelToken::never())
        .await
        .is_err());
    assert_eq!(db.cache_stats().await.unwrap().total_entries, 0);
}

#[tokio::test]
async fn test_different_sort_is_a_different_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bbc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .expect(2)
        .mount(&server)
        .await;

    let db = test_db().await;
    let svc = service(&server, db.clone());
    let never = CancelToken::never();

    svc.list_news(&ListNewsParams::default(), &never).await.unwrap();
    svc.list_news(
        &ListNewsParams {
            sort: Some("ASC".into()),
            ..ListNewsParams::default()
        },
        &never,
    )
    .await
    .unwrap();

    assert_eq!(db.cache_stats().await.unwrap().total_entries, 2);
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use serde_json::{json, Value};
use xrefkit::config::ExternalReferenceConfig;
use xrefkit::errors::{Result, XrefError};
use xrefkit::fetch::{ExternalReferenceCache, Fetch};
use xrefkit::types::ExternalReferenceKind;

/// Serves canned JSON by url, counting every request.
struct StubFetcher {
    responses: HashMap<String, Value>,
    calls: AtomicUsize,
    delay: Duration,
}

impl StubFetcher {
    fn new(responses: Vec<(&str, Value)>) -> Self {
        Self {
            responses: responses
                .into_iter()
                .map(|(url, value)| (url.to_string(), value))
                .collect(),
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for StubFetcher {
    fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| XrefError::Fetch {
                    message: "404 Not Found".to_string(),
                    url: url.to_string(),
                })
        })
    }
}

fn page_json(title: &str) -> Value {
    json!({
        "mdast": {"type": "root", "children": [{"type": "text", "value": title}]},
        "frontmatter": {"title": title},
        "slug": "install",
    })
}

#[tokio::test]
async fn test_concurrent_fetches_share_one_request() {
    let fetcher = Arc::new(StubFetcher::new(vec![(
        "https://guide.example.org/install.json",
        page_json("Install"),
    )]));
    let cache = ExternalReferenceCache::new(fetcher.clone());

    let results = join_all(
        (0..8).map(|_| cache.fetch("https://guide.example.org/install.json")),
    )
    .await;

    assert_eq!(fetcher.calls(), 1);
    assert!(results.iter().all(|r| r.is_some()));
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.frontmatter.title.as_deref(), Some("Install"));
    assert!(results
        .iter()
        .all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));
    assert_eq!(cache.document_count().await, 1);
}

#[tokio::test]
async fn test_failed_fetch_is_none_and_memoized() {
    let fetcher = Arc::new(StubFetcher::new(Vec::new()));
    let cache = ExternalReferenceCache::new(fetcher.clone());

    assert!(cache.fetch("https://guide.example.org/missing.json").await.is_none());
    assert!(cache.fetch("https://guide.example.org/missing.json").await.is_none());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_malformed_document_is_none() {
    let fetcher = Arc::new(StubFetcher::new(vec![(
        "https://guide.example.org/bad.json",
        json!({"no": "mdast"}),
    )]));
    let cache = ExternalReferenceCache::new(fetcher);
    assert!(cache.fetch("https://guide.example.org/bad.json").await.is_none());
}

#[tokio::test]
async fn test_distinct_urls_fetch_separately() {
    let fetcher = Arc::new(StubFetcher::new(vec![
        ("https://a.example.org/p.json", page_json("A")),
        ("https://b.example.org/p.json", page_json("B")),
    ]));
    let cache = ExternalReferenceCache::new(fetcher.clone());
    let (a, b) = tokio::join!(
        cache.fetch("https://a.example.org/p.json"),
        cache.fetch("https://b.example.org/p.json")
    );
    assert_eq!(a.unwrap().frontmatter.title.as_deref(), Some("A"));
    assert_eq!(b.unwrap().frontmatter.title.as_deref(), Some("B"));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_load_references() {
    let fetcher = Arc::new(StubFetcher::new(vec![(
        "https://guide.example.org/myst.xref.json",
        json!({
            "version": "1",
            "references": [
                {"kind": "page", "url": "/", "data": "/index.json"},
                {"kind": "figure", "identifier": "fig-arch", "html_id": "fig-arch",
                 "url": "/install", "data": "/install.json"}
            ]
        }),
    )]));
    let cache = ExternalReferenceCache::new(fetcher.clone());
    let configs = vec![
        ExternalReferenceConfig {
            key: "guide".to_string(),
            url: "https://guide.example.org/".to_string(),
            kind: ExternalReferenceKind::Myst,
        },
        ExternalReferenceConfig {
            key: "down".to_string(),
            url: "https://down.example.org".to_string(),
            kind: ExternalReferenceKind::Myst,
        },
        ExternalReferenceConfig {
            key: "intersphinx".to_string(),
            url: "https://docs.example.org".to_string(),
            kind: ExternalReferenceKind::Generic,
        },
    ];

    let loaded = cache.load_references(&configs).await;
    assert_eq!(loaded.len(), 3);
    let guide = loaded[0].value.as_ref().unwrap();
    assert_eq!(guide.references.len(), 2);
    assert!(!guide.references[0].implicit);
    assert!(loaded[1].value.is_none());
    assert!(loaded[2].value.is_none());
    // The generic project is never fetched
    assert_eq!(fetcher.calls(), 2);
}

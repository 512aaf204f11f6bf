use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use lexicache::application::repos::{
    OffsetPage, RepoError, WordListing, WordQueryFilter, WordsRepo,
};
use lexicache::application::warmer::Warmer;
use lexicache::application::words::{WordCache, WordService};
use lexicache::domain::entities::WordRecord;
use lexicache::infra::http::{ApiState, build_router};
use lexicache::infra::memory::InMemoryWordsRepo;

const DEFAULT_TTL: i64 = 300;

fn record(term: &str, minutes_ago: i64) -> WordRecord {
    let at = OffsetDateTime::now_utc() - time::Duration::minutes(minutes_ago);
    WordRecord {
        id: Uuid::new_v4(),
        term: term.to_string(),
        definitions: vec![format!("definition of {term}")],
        tags: vec!["rust".to_string()],
        created_at: at,
        updated_at: at,
    }
}

fn app_with(repo: Arc<InMemoryWordsRepo>, warm_source: Arc<dyn WordsRepo>) -> Router {
    let cache = Arc::new(WordCache::new(20, 100).expect("cache"));
    let words = Arc::new(WordService::new(
        repo.clone(),
        repo,
        cache.clone(),
        DEFAULT_TTL,
    ));
    let warmer = Arc::new(Warmer::new(
        warm_source,
        cache,
        DEFAULT_TTL,
        Duration::from_secs(5),
    ));
    build_router(ApiState::new(words, warmer))
}

fn app(records: Vec<WordRecord>) -> Router {
    let repo = Arc::new(InMemoryWordsRepo::from_records(records));
    app_with(repo.clone(), repo)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn banner_lists_service_name() {
    let app = app(Vec::new());
    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "lexicache");
    assert!(body["endpoints"].as_array().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn word_lifecycle_over_http() {
    let app = app(Vec::new());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/words",
        Some(json!({
            "term": "Mutex",
            "definitions": ["mutual exclusion lock"],
            "tags": ["Sync"],
            "ttl": 60
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["cacheTtl"], 60);
    assert_eq!(body["word"]["term"], "mutex");
    assert_eq!(body["word"]["tags"], json!(["sync"]));

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/words/mutex",
        Some(json!({ "definition": "a lock guarding shared data" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cacheTtl"], DEFAULT_TTL);
    assert_eq!(body["word"]["tags"], json!(["sync"]));

    let (status, body) = send(&app, Method::GET, "/api/words/mutex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "cache-near");
    assert_eq!(body["word"]["definitions"], json!(["a lock guarding shared data"]));
    assert!(body["cache"]["ttlRemaining"].as_u64().is_some());

    let (status, _) = send(&app, Method::DELETE, "/api/words/mutex", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/words/mutex", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(&app, Method::DELETE, "/api/words/mutex", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creating_an_existing_word_conflicts() {
    let app = app(vec![record("arc", 1)]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/words",
        Some(json!({ "term": "ARC", "definition": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
    assert!(
        body["error"]["hint"]
            .as_str()
            .is_some_and(|hint| hint.contains("PUT /api/words/arc"))
    );
}

#[tokio::test]
async fn updating_an_unknown_word_is_not_found() {
    let app = app(Vec::new());

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/words/ghost",
        Some(json!({ "definitions": ["boo"] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(&app, Method::GET, "/api/words/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn word_listing_is_paginated_filtered_and_cached() {
    let mut locking = record("rwlock", 1);
    locking.tags = vec!["locking".to_string()];
    let app = app(vec![
        record("box", 1),
        record("arc", 1),
        record("cell", 1),
        locking,
    ]);

    let (status, body) = send(&app, Method::GET, "/api/words?page=2&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "database");
    assert_eq!(body["words"][0]["term"], "cell");
    assert_eq!(body["words"][1]["term"], "rwlock");
    assert_eq!(body["pagination"]["totalItems"], 4);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["currentPage"], 2);
    assert_eq!(body["pagination"]["pageSize"], 2);

    let (_, body) = send(&app, Method::GET, "/api/words?page=2&limit=2", None).await;
    assert_eq!(body["source"], "cache-near");

    let (_, body) = send(&app, Method::GET, "/api/words?tags=LOCK", None).await;
    assert_eq!(body["pagination"]["totalItems"], 1);
    assert_eq!(body["words"][0]["term"], "rwlock");

    let (_, body) = send(&app, Method::GET, "/api/words?term=R", None).await;
    let terms: Vec<&str> = body["words"]
        .as_array()
        .expect("words")
        .iter()
        .filter_map(|word| word["term"].as_str())
        .collect();
    assert_eq!(terms, vec!["arc", "rwlock"]);

    send(
        &app,
        Method::POST,
        "/api/words",
        Some(json!({ "term": "chan", "definition": "message passing" })),
    )
    .await;
    let (_, body) = send(&app, Method::GET, "/api/words?page=2&limit=2", None).await;
    assert_eq!(body["source"], "database");
    assert_eq!(body["pagination"]["totalItems"], 5);

    let (_, body) = send(&app, Method::GET, "/api/cache", None).await;
    let listings = body["cache"]["far"]
        .as_array()
        .expect("far entries")
        .iter()
        .filter(|entry| entry["key"].as_str().is_some_and(|key| key.starts_with("list_")))
        .count();
    assert_eq!(listings, 1);

    for uri in ["/api/words?page=0", "/api/words?limit=1000", "/api/words?page=first"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn bulk_create_reports_each_entry() {
    let app = app(vec![record("vec", 1)]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/words/bulk",
        Some(json!({
            "defaultTtl": 90,
            "words": [
                { "term": "slice", "definition": "view into a sequence" },
                { "definitions": ["orphan"] },
                { "term": "str" },
                { "term": "vec", "definitions": ["growable array"] }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["message"],
        "Bulk operation completed. Added: 1, skipped: 3"
    );
    assert_eq!(body["results"]["added"][0]["term"], "slice");
    assert_eq!(body["results"]["skipped"][0]["reason"], "missing term");
    assert_eq!(body["results"]["skipped"][1]["term"], "str");
    assert_eq!(body["results"]["skipped"][1]["reason"], "missing definitions");
    assert_eq!(body["results"]["skipped"][2]["reason"], "term already exists");

    let (_, body) = send(&app, Method::GET, "/api/cache/slice", None).await;
    assert!(body["ttlRemaining"].as_u64().is_some_and(|ttl| ttl <= 90));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/words/bulk",
        Some(json!({ "words": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn word_lookup_reads_through_the_store_once() {
    let app = app(vec![record("arc", 1)]);

    let (status, body) = send(&app, Method::GET, "/api/words/arc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "database");
    assert_eq!(body["cacheTtl"], DEFAULT_TTL);
    assert!(body.get("cache").is_none());

    let (_, body) = send(&app, Method::GET, "/api/words/arc", None).await;
    assert_eq!(body["source"], "cache-near");
}

#[tokio::test]
async fn invalid_word_payloads_are_rejected() {
    let app = app(vec![record("enum", 1)]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/words",
        Some(json!({ "term": "struct", "definitions": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/words",
        Some(json!({ "definitions": ["no term"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/words/enum",
        Some(json!({ "definitions": ["  "] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = send(&app, Method::GET, "/api/words/%20", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cache_entry_endpoints() {
    let app = app(vec![record("future", 1)]);

    let (status, body) = send(&app, Method::GET, "/api/cache/future", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, Method::POST, "/api/cache/future?ttl=45", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ttl"], 45);
    assert_eq!(body["term"], "future");

    let (status, body) = send(&app, Method::POST, "/api/cache/future", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, body) = send(&app, Method::POST, "/api/cache/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(&app, Method::POST, "/api/cache/future?ttl=soon", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(&app, Method::GET, "/api/cache/future", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "near");
    assert_eq!(body["value"]["term"], "future");
    assert!(body["ttlRemaining"].as_u64().is_some_and(|ttl| ttl <= 45));
    assert!(body["expiresAt"].is_string());

    let (status, body) = send(&app, Method::DELETE, "/api/cache/future", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["term"], "future");

    let (status, _) = send(&app, Method::DELETE, "/api/cache/future", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cache_overview_stats_and_clear() {
    let app = app(vec![record("slice", 1)]);

    send(&app, Method::GET, "/api/words/slice", None).await;
    send(&app, Method::GET, "/api/words/slice", None).await;

    let (status, body) = send(&app, Method::GET, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache"]["near"][0]["key"], "slice");
    assert_eq!(body["cache"]["far"][0]["key"], "slice");
    assert_eq!(body["stats"]["nearCache"]["size"], 1);

    let (status, body) = send(&app, Method::GET, "/api/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["overall"]["requests"], 2);
    assert_eq!(body["stats"]["overall"]["hits"], 1);
    assert_eq!(body["stats"]["overall"]["misses"], 1);
    assert_eq!(body["stats"]["overall"]["hitRate"], 50.0);

    let (status, body) = send(&app, Method::DELETE, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["overall"]["requests"], 0);
    assert_eq!(body["stats"]["nearCache"]["size"], 0);
    assert_eq!(body["stats"]["farCache"]["size"], 0);
}

#[tokio::test]
async fn capacity_endpoints_validate_and_resize() {
    let app = app(vec![record("vec", 1)]);
    send(&app, Method::GET, "/api/words/vec", None).await;

    let (status, body) = send(&app, Method::GET, "/api/capacity", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"]["nearCapacity"], 20);
    assert_eq!(body["capacity"]["farCapacity"], 100);

    for payload in [
        json!({}),
        json!({ "nearCapacity": 0 }),
        json!({ "farCapacity": -5 }),
        json!({ "nearCapacity": "ten" }),
        json!({ "nearCapacity": 1.5 }),
    ] {
        let (status, body) = send(&app, Method::PUT, "/api/capacity", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_capacity");
    }

    let (_, body) = send(&app, Method::GET, "/api/capacity", None).await;
    assert_eq!(body["capacity"]["nearCapacity"], 20);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/capacity",
        Some(json!({ "nearCapacity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"]["nearCapacity"], 3);
    assert_eq!(body["capacity"]["farCapacity"], 100);
    assert_eq!(body["stats"]["overall"]["requests"], 0);
    assert_eq!(body["stats"]["nearCache"]["size"], 0);
    assert_eq!(body["stats"]["farCache"]["size"], 1);
}

#[tokio::test]
async fn warmer_trigger_and_status() {
    let app = app(vec![record("box", 3), record("rc", 2), record("cell", 1)]);

    let (status, body) = send(&app, Method::GET, "/api/admin/cache-warmer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isWarming"], false);
    assert!(body["lastWarmedAt"].is_null());

    let (status, body) = send(&app, Method::POST, "/api/admin/cache-warmer/trigger", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["fetched"], 3);
    assert_eq!(body["cached"], 6);
    assert_eq!(body["skipped"], false);
    assert_eq!(body["usage"]["nearSize"], 3);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/cache-warmer/trigger",
        Some(json!({ "limit": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fetched"], 2);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/cache-warmer/trigger",
        Some(json!({ "limit": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (_, body) = send(&app, Method::GET, "/api/admin/cache-warmer", None).await;
    assert!(body["lastWarmedAt"].is_string());
}

struct UnavailableRepo;

#[async_trait]
impl WordsRepo for UnavailableRepo {
    async fn find_by_term(&self, _term: &str) -> Result<Option<WordRecord>, RepoError> {
        Err(RepoError::Timeout)
    }

    async fn list_recently_updated(&self, _limit: u32) -> Result<Vec<WordRecord>, RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn list_words(
        &self,
        _filter: &WordQueryFilter,
        _page: OffsetPage,
    ) -> Result<WordListing, RepoError> {
        Err(RepoError::Timeout)
    }
}

#[tokio::test]
async fn warm_failure_maps_to_server_error() {
    let repo = Arc::new(InMemoryWordsRepo::new());
    let app = app_with(repo, Arc::new(UnavailableRepo));

    let (status, body) = send(&app, Method::POST, "/api/admin/cache-warmer/trigger", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "warm_failed");
    assert!(
        body["error"]["hint"]
            .as_str()
            .is_some_and(|hint| hint.contains("connection refused"))
    );

    let (_, body) = send(&app, Method::GET, "/api/admin/cache-warmer", None).await;
    assert_eq!(body["isWarming"], false);
    assert!(body["lastWarmedAt"].is_null());
}

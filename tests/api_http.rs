// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health, GET /status
// - POST /articles/generate (503 without credentials, run summary with mocks)
// - GET /articles (filters, paging, limit cap)
// - GET /articles/{id} (200 / 404)
// - POST /factcheck (400 validation, unavailable verdict, articleId resolution)
// - POST /sources/fetch
// - POST /interests, POST /interests/search

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value as Json};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use newsdesk::api::{router, AppState};
use newsdesk::config::PipelineConfig;
use newsdesk::llm::mock::{MockSearch, MockText};
use newsdesk::llm::xai::LlmClients;
use newsdesk::llm::LlmError;
use newsdesk::model::{Category, RawSourceItem, SubCategory};
use newsdesk::store::{MemoryStore, Store};

const BODY_LIMIT: usize = 1024 * 1024;

fn config() -> PipelineConfig {
    PipelineConfig {
        feeds: Vec::new(),
        ..PipelineConfig::default()
    }
}

fn mock_clients() -> LlmClients {
    LlmClients {
        text: Arc::new(MockText::canned()),
        search: Arc::new(MockSearch::canned()),
    }
}

fn build_app(clients: LlmClients) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::build(&config(), clients, store.clone()).expect("state");
    (router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Json::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, json)
}

fn source(id: &str, title: &str) -> RawSourceItem {
    let now = Utc::now();
    RawSourceItem {
        id: id.into(),
        title: title.into(),
        description: "Kort beskrivelse.".into(),
        url: format!("https://news.example/{id}"),
        source_name: "DR".into(),
        published_at: now,
        fetched_at: now,
        category: Category::Domestic,
        sub_category: SubCategory::General,
        raw_content: String::new(),
        processed: false,
    }
}

#[tokio::test]
async fn health_and_status() {
    let (app, _) = build_app(LlmClients::disabled());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("ok".into()));

    let (status, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["textCompletion"], "pending");
    assert_eq!(body["webSearch"], "pending");
    assert_eq!(body["store"], "active");
    assert_eq!(body["rateLimit"]["limit"], 50);

    let (app, _) = build_app(mock_clients());
    let (_, body) = send(&app, "GET", "/status", None).await;
    assert_eq!(body["textCompletion"], "active");
    assert!(body["providers"].as_array().is_some_and(|p| !p.is_empty()));
}

#[tokio::test]
async fn generate_without_credentials_is_service_unavailable() {
    let (app, store) = build_app(LlmClients::disabled());
    store.upsert_raw_sources(&[source("s1", "Jordskælv rammer Japan")]).await.unwrap();

    let (status, body) = send(&app, "POST", "/articles/generate", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap_or_default().contains("not configured"));
    assert!(!store.source("s1").unwrap().processed);
}

#[tokio::test]
async fn generate_then_read_article_back() {
    let (app, store) = build_app(mock_clients());
    store
        .upsert_raw_sources(&[source("s1", "Jordskælv rammer Japan")])
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/articles/generate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated"], 1);
    assert_eq!(body["totalGroups"], 1);
    assert_eq!(body["articles"], json!(["Jordskælv rammer Japan"]));
    assert!(body.get("errors").is_none());

    let id = store.articles()[0].id.clone();
    let (status, article) = send(&app, "GET", &format!("/articles/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(article["title"], "Jordskælv rammer Japan");
    assert_eq!(article["sources"][0]["source_name"], "DR");

    let (status, _) = send(&app, "GET", "/articles/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn factcheck_validation_and_unavailable_verdict() {
    let (app, _) = build_app(LlmClients::disabled());

    let (status, _) = send(&app, "POST", "/factcheck", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/factcheck", Some(json!({"articleId": "nope"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/factcheck", Some(json!({"title": "Test artikel"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], -1);
    assert!(body["summary"].as_str().unwrap_or_default().contains("unavailable"));
    assert_eq!(body["verificationMethod"], "ai-only");
    assert_eq!(body["sourcesConsulted"], 0);
}

#[tokio::test]
async fn factcheck_by_article_id_resolves_and_writes_back() {
    let (app, store) = build_app(mock_clients());
    store
        .upsert_raw_sources(&[source("s1", "Jordskælv rammer Japan")])
        .await
        .unwrap();
    send(&app, "POST", "/articles/generate", None).await;
    let id = store.articles()[0].id.clone();

    let (status, body) = send(&app, "POST", "/factcheck", Some(json!({"articleId": id.clone()}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 80);
    assert_eq!(body["verificationMethod"], "web-search");
    assert_eq!(body["sources"], json!(["mock.example"]));
    assert_eq!(body["claims"][0]["verdict"], "mostly-true");

    let saved = store.article_by_id(&id).await.unwrap().unwrap();
    assert_eq!(saved.fact_score, 80);
}

#[tokio::test]
async fn fetch_sources_collects_from_discovery() {
    let (app, store) = build_app(mock_clients());
    let (status, body) = send(&app, "POST", "/sources/fetch", None).await;
    assert_eq!(status, StatusCode::OK);
    // every canned discovery answer points at the same story URL
    assert_eq!(body["unique"], 1);
    assert_eq!(body["inserted"], 1);
    assert_eq!(store.sources().len(), 1);
}

#[tokio::test]
async fn interests_register_and_reject_blank() {
    let (app, _) = build_app(LlmClients::disabled());

    let (status, _) = send(&app, "POST", "/interests", Some(json!({"name": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/interests", Some(json!({"name": "Krypto"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registered"], true);
    assert!(body["interests"].as_array().unwrap().iter().any(|n| n == "Krypto"));

    let (_, body) = send(&app, "POST", "/interests", Some(json!({"name": "krypto"}))).await;
    assert_eq!(body["registered"], false);

    let (_, list) = send(&app, "GET", "/interests", None).await;
    assert!(list.as_array().unwrap().iter().any(|n| n == "Tesla"));
}

#[tokio::test]
async fn article_feed_filters_and_pages() {
    let (app, store) = build_app(mock_clients());
    store
        .upsert_raw_sources(&[
            source("s1", "Jordskælv rammer Japan"),
            source("s2", "Ørsted bygger havvindmøllepark ved Bornholm"),
        ])
        .await
        .unwrap();
    let (_, run) = send(&app, "POST", "/articles/generate", None).await;
    assert_eq!(run["generated"], 2);

    let (status, feed) = send(&app, "GET", "/articles", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["count"], 2);
    assert_eq!(feed["limit"], 20);
    assert_eq!(feed["offset"], 0);
    assert_eq!(feed["hasMore"], false);
    assert_eq!(feed["articles"].as_array().map(Vec::len), Some(2));

    let (_, first) = send(&app, "GET", "/articles?limit=1", None).await;
    let (_, second) = send(&app, "GET", "/articles?limit=1&offset=1", None).await;
    assert_eq!(first["hasMore"], true);
    assert_eq!(second["hasMore"], false);
    assert_ne!(first["articles"][0]["id"], second["articles"][0]["id"]);

    // the canned writer files every story under "global"
    let (_, global) = send(&app, "GET", "/articles?category=global&subCategory=general", None).await;
    assert_eq!(global["count"], 2);
    let (_, domestic) = send(&app, "GET", "/articles?category=domestic", None).await;
    assert_eq!(domestic["count"], 0);
    let (_, tagged) = send(&app, "GET", "/articles?tag=Renter", None).await;
    assert_eq!(tagged["count"], 0);

    let (_, capped) = send(&app, "GET", "/articles?limit=500", None).await;
    assert_eq!(capped["limit"], 50);

    let (status, _) = send(&app, "GET", "/articles?category=sport", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn interest_search_stores_stories_once() {
    let (app, store) = build_app(mock_clients());

    let (status, body) = send(&app, "POST", "/interests/search", Some(json!({"interestName": " Krypto "}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interest"], "Krypto");
    assert_eq!(body["total_discovered"], 1);
    assert_eq!(body["inserted"], 1);

    let stored = store.sources();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, "https://mock.example/markets");
    assert_eq!(stored[0].category, Category::Global);
    assert!(!stored[0].processed);

    // same story again: URL conflict, nothing inserted
    let (_, body) = send(&app, "POST", "/interests/search", Some(json!({"name": "Krypto"}))).await;
    assert_eq!(body["total_discovered"], 1);
    assert_eq!(body["inserted"], 0);
}

#[tokio::test]
async fn interest_search_validation_and_upstream_failure() {
    let (app, _) = build_app(mock_clients());
    let (status, _) = send(&app, "POST", "/interests/search", Some(json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (app, _) = build_app(LlmClients::disabled());
    let (status, _) = send(&app, "POST", "/interests/search", Some(json!({"name": "Krypto"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (app, store) = build_app(LlmClients {
        text: Arc::new(MockText::canned()),
        search: Arc::new(MockSearch::failing(LlmError::Status {
            status: 500,
            body: "search down".into(),
        })),
    });
    let (status, body) = send(&app, "POST", "/interests/search", Some(json!({"name": "Krypto"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap_or_default().contains("search failed"));
    assert!(store.sources().is_empty());
}

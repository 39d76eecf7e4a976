// tests/metrics.rs
//
// Prometheus exposition through the metrics router. Installs the global
// recorder, so it lives in its own test binary.

use std::sync::Arc;

use axum::body::{self, Body};
use http::{Request, StatusCode};
use tower::ServiceExt;

use newsdesk::config::FactCheckConfig;
use newsdesk::factcheck::{FactCheckEngine, FactCheckRequest};
use newsdesk::llm::mock::{MockSearch, MockText};
use newsdesk::metrics::Metrics;

#[tokio::test]
async fn metrics_endpoint_exposes_factcheck_series() {
    let metrics = Metrics::init(30).expect("install recorder");

    let engine = FactCheckEngine::new(
        Arc::new(MockSearch::canned()),
        Arc::new(MockText::canned()),
        &FactCheckConfig::default(),
    );
    let req = FactCheckRequest::new("Nationalbanken holder renten", "", "DR");
    engine.check(&req).await;
    engine.check(&req).await;

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("factcheck_cache_ttl_ms 1800000"), "{text}");
    assert!(text.contains("factcheck_cache_hits_total 1"), "{text}");
    assert!(text.contains(r#"factcheck_requests_total{path="web-search"} 1"#), "{text}");
    assert!(text.contains(r#"factcheck_requests_total{path="cache"} 1"#), "{text}");
    assert!(text.contains("factcheck_duration_ms"), "{text}");
}

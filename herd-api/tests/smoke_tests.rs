//! Smoke tests for the non-cached endpoints and the auth layer.

mod support;

use axum::http::{Method, Request, StatusCode};
use herd_api::auth::TENANT_ID_HEADER;
use serde_json::json;
use support::*;

#[tokio::test]
async fn test_health_endpoint() {
    let h = Harness::new(test_config());

    let response = h.send(get_as("/health", None)).await;
    assert_status(&response, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn test_health_is_never_cached() {
    let h = Harness::new(test_config());

    h.send(get_as("/health", None)).await;
    let second = h.send(get_as("/health", None)).await;

    assert_eq!(age_of(&second), None);
    assert!(h.cache.cache().is_empty());
}

#[tokio::test]
async fn test_cache_stats_endpoint() {
    let h = Harness::new(test_config());
    h.send(get_as("/api/v1/servers", Some(1))).await;
    h.send(get_as("/api/v1/servers", Some(1))).await;

    let response = h.send(get_as("/cache/stats", None)).await;
    assert_status(&response, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cache"]["entries"], 1);
    assert_eq!(body["cache"]["hits"], 1);
    assert_eq!(body["cache"]["misses"], 1);
    assert_eq!(body["coalescing"]["leaders"], 1);
    assert_eq!(body["coalescing"]["in_flight_keys"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let h = Harness::new(test_config());
    h.send(get_as("/api/v1/servers", Some(1))).await;

    let response = h.send(get_as("/metrics", None)).await;
    assert_status(&response, StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await.to_vec()).expect("utf-8 metrics");
    assert!(text.contains("herd_cache_lookups_total"));
    assert!(text.contains("herd_cache_entries"));
}

#[tokio::test]
async fn test_malformed_tenant_header_is_rejected() {
    let h = Harness::new(test_config());

    for value in ["abc", "-3", ""] {
        let request = Request::builder()
            .uri("/api/v1/servers")
            .header(TENANT_ID_HEADER, value)
            .body(axum::body::Body::empty())
            .expect("valid request");
        let response = h.send(request).await;
        assert_status(&response, StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INVALID_TOKEN");
    }
    assert_eq!(h.store.reads(), 0);
}

#[tokio::test]
async fn test_anonymous_writes_are_rejected() {
    let h = Harness::new(test_config());

    let mut request = json_as(Method::POST, "/api/v1/servers", 1, json!({"name": "x"}));
    request.headers_mut().remove(TENANT_ID_HEADER);
    let response = h.send(request).await;

    assert_status(&response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_kind_is_rejected() {
    let h = Harness::new(test_config());

    let response = h.send(get_as("/api/v1/bad%20kind", Some(1))).await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

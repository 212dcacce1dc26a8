//! Shared helpers for router-level tests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::get,
    Router,
};
use bytes::Bytes;
use herd_api::{
    auth::{ROLE_ID_HEADER, TENANT_ID_HEADER},
    create_router, header_auth_middleware, response_cache_middleware, ApiConfig, AppState,
    ResourceStore, ResponseCacheState,
};
use herd_core::{CacheConfig, ManualClock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::ServiceExt;

// ============================================================================
// FULL SERVER HARNESS
// ============================================================================

/// The complete HERD router on a manual clock.
pub struct Harness {
    pub app: Router,
    pub store: Arc<ResourceStore>,
    pub cache: ResponseCacheState,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(config: CacheConfig) -> Self {
        let clock = Arc::new(ManualClock::new());
        let cache = ResponseCacheState::with_clock(config.clone(), clock.clone())
            .expect("test cache config is valid");
        let state = AppState::new(ResourceStore::new(), cache.clone());
        let store = Arc::clone(&state.store);
        let api_config = ApiConfig {
            cache: config,
            ..Default::default()
        };

        Self {
            app: create_router(state, &api_config),
            store,
            cache,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

// ============================================================================
// GATED HANDLER HARNESS
// ============================================================================

/// A cached route whose handler blocks until released, for coalescing tests.
///
/// The first handler invocation waits on the gate; later ones run straight
/// through.
pub struct GatedRoute {
    pub app: Router,
    pub cache: ResponseCacheState,
    pub calls: Arc<AtomicUsize>,
    pub gate: Arc<Semaphore>,
}

/// Path served by [`GatedRoute`].
pub const GATED_PATH: &str = "/api/v1/slow";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gating {
    FirstCall,
    FirstCallPanics,
    EveryCall,
}

impl GatedRoute {
    /// Handler that returns a body naming the call that produced it.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_gating(config, Gating::FirstCall)
    }

    /// Handler whose first call panics once released.
    pub fn panicking(config: CacheConfig) -> Self {
        Self::with_gating(config, Gating::FirstCallPanics)
    }

    /// Handler where every call waits for its own permit.
    pub fn gating_every_call(config: CacheConfig) -> Self {
        Self::with_gating(config, Gating::EveryCall)
    }

    fn with_gating(config: CacheConfig, gating: Gating) -> Self {
        let cache = ResponseCacheState::new(config).expect("test cache config is valid");
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let handler = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            move || {
                let calls = Arc::clone(&calls);
                let gate = Arc::clone(&gate);
                async move {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    if call == 0 || gating == Gating::EveryCall {
                        let permit = gate.acquire().await.expect("gate stays open");
                        permit.forget();
                        if gating == Gating::FirstCallPanics {
                            panic!("leader handler failed");
                        }
                    }
                    format!("call-{}", call)
                }
            }
        };

        let app = Router::new()
            .route(GATED_PATH, get(handler))
            .layer(from_fn_with_state(cache.clone(), response_cache_middleware))
            .layer(from_fn(header_auth_middleware));

        Self {
            app,
            cache,
            calls,
            gate,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Let one gated handler call proceed.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Let `n` gated handler calls proceed.
    pub fn release_many(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

// ============================================================================
// REQUEST HELPERS
// ============================================================================

pub fn get_as(path: &str, tenant: Option<i64>) -> Request<Body> {
    request_as(Method::GET, path, tenant, Body::empty())
}

pub fn json_as(method: Method, path: &str, tenant: i64, body: serde_json::Value) -> Request<Body> {
    let mut request = request_as(method, path, Some(tenant), Body::from(body.to_string()));
    request.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("application/json"),
    );
    request
}

pub fn request_as(method: Method, path: &str, tenant: Option<i64>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(tenant) = tenant {
        builder = builder
            .header(TENANT_ID_HEADER, tenant.to_string())
            .header(ROLE_ID_HEADER, "1");
    }
    builder.body(body).expect("valid request")
}

pub async fn body_bytes(response: Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub fn age_of(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(axum::http::header::AGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}

/// Poll `condition` until it holds, failing after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub use herd_test_utils::fixtures::test_config;

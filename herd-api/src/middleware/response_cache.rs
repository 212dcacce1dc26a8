//! Response Cache Middleware
//!
//! Shields handlers from duplicate GET traffic. For each GET request:
//!
//! 1. Resolve the caller identity (anonymous if there is no [`AuthContext`]).
//! 2. An authenticated caller that sent a no-cache directive skips the cache
//!    and coalescing entirely.
//! 3. Build the [`CacheKey`] and, when caching is on, serve a fresh entry
//!    directly with an `Age` header.
//! 4. On a miss, join the coalescing queue. The leader runs the handler,
//!    stores the captured response, and hands it to every follower. Followers
//!    replay the leader's response verbatim.
//!
//! Unsafe methods (POST, PUT, PATCH, DELETE) run the handler and then
//! invalidate every cached entry for the request path. Other methods pass
//! through untouched.
//!
//! Internal trouble never fails a request. A follower whose leader went away
//! or timed out runs the handler itself, and a response that cannot be
//! buffered is passed through uncached.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware};
//! use herd_api::middleware::{response_cache_middleware, ResponseCacheState};
//! use herd_core::CacheConfig;
//!
//! let cache_state = ResponseCacheState::new(CacheConfig::from_env())?;
//!
//! let app = Router::new()
//!     .route("/api/v1/servers", axum::routing::get(list_servers))
//!     .layer(middleware::from_fn_with_state(cache_state.clone(), response_cache_middleware))
//!     .layer(middleware::from_fn(header_auth_middleware));
//! ```
//!
//! [`AuthContext`]: crate::auth::AuthContext

use crate::auth::resolve_identity;
use crate::error::ApiError;
use crate::middleware::capture::{capture_response, replay, Captured};
use crate::telemetry::{metrics, CoalesceOutcome, LookupOutcome};
use axum::{
    extract::{Request, State},
    http::{
        header::{CACHE_CONTROL, PRAGMA},
        HeaderMap, Method,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use herd_core::{
    CacheConfig, CacheKey, CacheStats, CachedResponse, Clock, CoalesceStats, CoalescingQueue,
    HerdResult, LeaderGuard, Lookup, Role, SmallCache, SystemClock,
};
use serde::Serialize;
use std::sync::Arc;

/// Queue type used by the middleware.
pub type ResponseQueue = CoalescingQueue<CacheKey, Arc<CachedResponse>>;

// ============================================================================
// STATE
// ============================================================================

/// Shared state for the response cache middleware.
///
/// One instance per router. Cloning is cheap and clones share the cache.
#[derive(Debug, Clone)]
pub struct ResponseCacheState {
    cache: Arc<SmallCache>,
    queue: Arc<ResponseQueue>,
    config: Arc<CacheConfig>,
}

/// Combined statistics, served at `/cache/stats`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResponseCacheStats {
    pub cache: CacheStats,
    pub coalescing: CoalesceStats,
}

impl ResponseCacheState {
    /// Create state on the system clock. Fails if `config` is invalid.
    pub fn new(config: CacheConfig) -> HerdResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> HerdResult<Self> {
        config.validate()?;
        Ok(Self {
            cache: Arc::new(SmallCache::from_config(&config, clock)),
            queue: Arc::new(ResponseQueue::new()),
            config: Arc::new(config),
        })
    }

    pub fn cache(&self) -> &Arc<SmallCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<ResponseQueue> {
        &self.queue
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Drop every cached response for `path`. Handlers that mutate a resource
    /// outside the unsafe-method flow can call this directly.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let removed = self.cache.invalidate_path(path);
        if removed > 0 {
            if let Some(metrics) = metrics() {
                metrics.record_invalidation(removed);
            }
        }
        removed
    }

    pub fn stats(&self) -> ResponseCacheStats {
        ResponseCacheStats {
            cache: self.cache.stats(),
            coalescing: self.queue.stats(),
        }
    }
}

// ============================================================================
// MIDDLEWARE
// ============================================================================

/// Axum middleware implementing the response cache and request coalescing.
pub async fn response_cache_middleware(
    State(state): State<ResponseCacheState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET {
        if !is_unsafe_method(&method) {
            return next.run(request).await;
        }

        let path = request.uri().path().to_string();
        let response = next.run(request).await;
        let removed = state.invalidate_path(&path);
        tracing::debug!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            removed,
            "Invalidated cache after mutating request"
        );
        return response;
    }

    if state.config.is_passthrough() {
        return next.run(request).await;
    }

    let identity = resolve_identity(request.extensions());
    if identity.is_authenticated() && request_disallows_caching(request.headers()) {
        tracing::debug!(
            tenant_id = %identity.tenant_id,
            path = %request.uri().path(),
            "No-cache directive, bypassing response cache"
        );
        record_lookup(LookupOutcome::Bypass);
        return next.run(request).await;
    }

    let key = CacheKey::from_http(&identity, request.uri(), request.headers());

    if state.cache.is_enabled() {
        match state.cache.lookup(&key) {
            Lookup::Fresh(entry) => {
                record_lookup(LookupOutcome::Hit);
                let age = entry.age_header_value(state.cache.now());
                tracing::debug!(path = %key.path(), age, "Serving cached response");
                return replay(&entry, Some(age));
            }
            Lookup::Expired => {
                record_lookup(LookupOutcome::Expired);
                state.cache.maybe_collect_garbage();
            }
            Lookup::Miss => {
                record_lookup(LookupOutcome::Miss);
                state.cache.maybe_collect_garbage();
            }
        }
    }

    if !state.config.coalescing_enabled {
        let response = next.run(request).await;
        return store(&state, key, response).await;
    }

    match state.queue.join(key.clone()) {
        Role::Leader(guard) => {
            record_coalesce(CoalesceOutcome::Leader);
            lead(&state, key, guard, request, next).await
        }
        Role::Follower(follower) => {
            record_coalesce(CoalesceOutcome::Follower);
            match follower.wait(state.config.follower_timeout).await {
                Ok(entry) => replay(&entry, None),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %key.path(),
                        "Coalesced request lost its leader, running handler directly"
                    );
                    record_coalesce(CoalesceOutcome::Fallback);
                    next.run(request).await
                }
            }
        }
    }
}

/// Run the handler as leader for `key`, then publish its response.
///
/// If this future is dropped or the handler panics, `guard` is dropped with
/// it and the followers fall back to running the handler themselves.
async fn lead(
    state: &ResponseCacheState,
    key: CacheKey,
    guard: LeaderGuard<CacheKey, Arc<CachedResponse>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    match capture_response(response, state.config.max_body_bytes, state.cache.now()).await {
        Ok(Captured::Complete(entry)) => {
            let entry = Arc::new(entry);
            state.cache.insert(key, Arc::clone(&entry));
            let delivered = guard.complete(Arc::clone(&entry));
            if delivered > 0 {
                tracing::debug!(delivered, "Leader delivered response to followers");
            }
            replay(&entry, None)
        }
        Ok(Captured::Passthrough(response)) => {
            drop(guard);
            response
        }
        Err(err) => {
            drop(guard);
            ApiError::from(err).into_response()
        }
    }
}

/// Capture and cache a response without coalescing.
async fn store(state: &ResponseCacheState, key: CacheKey, response: Response) -> Response {
    match capture_response(response, state.config.max_body_bytes, state.cache.now()).await {
        Ok(Captured::Complete(entry)) => {
            let entry = Arc::new(entry);
            state.cache.insert(key, Arc::clone(&entry));
            replay(&entry, None)
        }
        Ok(Captured::Passthrough(response)) => response,
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn record_lookup(outcome: LookupOutcome) {
    if let Some(metrics) = metrics() {
        metrics.record_lookup(outcome);
    }
}

fn record_coalesce(outcome: CoalesceOutcome) {
    if let Some(metrics) = metrics() {
        metrics.record_coalesce(outcome);
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if the HTTP method may change server state.
pub fn is_unsafe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// True when the request asks not to be served from a cache:
/// `Cache-Control: no-cache`, `no-store` or `max-age=0`, or `Pragma: no-cache`.
pub fn request_disallows_caching(headers: &HeaderMap) -> bool {
    let cache_control = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| is_no_cache_directive(&directive));

    if cache_control {
        return true;
    }

    headers
        .get_all(PRAGMA)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
}

fn is_no_cache_directive(directive: &str) -> bool {
    match directive.split_once('=') {
        None => directive == "no-cache" || directive == "no-store",
        Some((name, value)) => {
            name.trim() == "max-age" && value.trim().trim_matches('"') == "0"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_unsafe_methods() {
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(is_unsafe_method(&method), "{} is unsafe", method);
        }
        for method in [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE] {
            assert!(!is_unsafe_method(&method), "{} is safe", method);
        }
    }

    #[test]
    fn test_no_cache_directives() {
        assert!(request_disallows_caching(&headers(&[("cache-control", "no-cache")])));
        assert!(request_disallows_caching(&headers(&[("cache-control", "No-Store")])));
        assert!(request_disallows_caching(&headers(&[("cache-control", "public, max-age=0")])));
        assert!(request_disallows_caching(&headers(&[("cache-control", "max-age = \"0\"")])));
        assert!(request_disallows_caching(&headers(&[("pragma", "no-cache")])));
        assert!(request_disallows_caching(&headers(&[
            ("cache-control", "max-age=60"),
            ("cache-control", "no-cache"),
        ])));
    }

    #[test]
    fn test_cacheable_requests() {
        assert!(!request_disallows_caching(&HeaderMap::new()));
        assert!(!request_disallows_caching(&headers(&[("cache-control", "max-age=60")])));
        assert!(!request_disallows_caching(&headers(&[("cache-control", "max-age=00x")])));
        assert!(!request_disallows_caching(&headers(&[("cache-control", "private")])));
        assert!(!request_disallows_caching(&headers(&[("pragma", "x-no-cache-please")])));
    }

    #[test]
    fn test_state_rejects_invalid_config() {
        let config = CacheConfig::default().with_gc_interval(Duration::ZERO);
        assert!(ResponseCacheState::new(config).is_err());
    }

    #[test]
    fn test_state_clones_share_cache() {
        let state = ResponseCacheState::new(CacheConfig::default()).expect("valid config");
        let clone = state.clone();
        assert!(Arc::ptr_eq(state.cache(), clone.cache()));
        assert!(Arc::ptr_eq(state.queue(), clone.queue()));
    }
}

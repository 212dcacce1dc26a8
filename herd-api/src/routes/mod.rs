//! REST API Routes
//!
//! Router assembly for the HERD server.
//!
//! # Middleware Order (outer to inner)
//! 1. Timeout - bounds every request
//! 2. Trace - `tower_http` request spans
//! 3. Observability - request metrics
//! 4. Auth (only on /api/v1/*) - resolves the caller identity
//! 5. Response cache (only on /api/v1/*) - caching and coalescing

pub mod health;
pub mod resources;

use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    config::ApiConfig,
    middleware::{header_auth_middleware, response_cache_middleware},
    state::AppState,
    telemetry::{metrics_handler, observability_middleware},
};

pub use health::create_router as health_router;
pub use resources::create_router as resources_router;

/// Build the cached API routes, layered with auth and the response cache.
pub fn api_router(state: &AppState) -> Router<AppState> {
    resources_router()
        .layer(from_fn_with_state(state.cache.clone(), response_cache_middleware))
        .layer(from_fn(header_auth_middleware))
}

/// Build the complete router.
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .merge(api_router(&state))
        .merge(health_router())
        .route("/metrics", get(metrics_handler))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .with_state(state)
}

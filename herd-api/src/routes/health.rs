//! Health and introspection endpoints.
//!
//! None of these routes sit behind the response cache.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{middleware::ResponseCacheState, state::AppState};

// ============================================================================
// TYPES
// ============================================================================

/// Liveness response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health - Process liveness check
pub async fn health(State(start_time): State<Instant>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        uptime_secs: start_time.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /cache/stats - Cache and coalescing statistics
pub async fn cache_stats(State(cache): State<ResponseCacheState>) -> impl IntoResponse {
    Json(cache.stats())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the health router (no auth, no caching).
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/cache/stats", get(cache_stats))
}

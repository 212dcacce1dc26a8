//! HERD API - Response Cache Middleware for Axum
//!
//! This crate wires the `herd-core` building blocks into an HTTP policy:
//! a `from_fn_with_state` middleware that serves fresh GET responses from a
//! per-identity cache, coalesces concurrent misses onto a single handler
//! call, and invalidates a path whenever a mutating request hits it.
//!
//! It also ships the pieces of a small reference server: development header
//! auth, JSON errors, tracing and Prometheus telemetry, and a tenant-scoped
//! in-memory resource API to put behind the cache.

pub mod auth;
pub mod config;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{extract_auth_context, resolve_identity, AuthContext, CallerIdentity};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{
    header_auth_middleware, response_cache_middleware, ResponseCacheState, ResponseCacheStats,
};
pub use routes::create_router;
pub use state::AppState;
pub use store::{Resource, ResourceStore};

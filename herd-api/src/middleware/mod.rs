//! Middleware modules for HERD API
//!
//! - `auth`: header-driven development authentication
//! - `response_cache`: response cache and request coalescing
//! - `capture`: buffering and replay of responses for the cache
//!
//! # Middleware Order
//!
//! The cache reads the caller identity from request extensions, so the auth
//! layer must wrap it:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/v1/servers", get(handler))
//!     // Innermost (runs last on request, first on response)
//!     .layer(middleware::from_fn_with_state(cache_state, response_cache_middleware))
//!     // Auth must run before the cache (provides tenant context)
//!     .layer(middleware::from_fn(header_auth_middleware))
//!     // Outermost
//! ```

mod auth;
pub mod capture;
pub mod response_cache;

pub use auth::{auth_context_from_headers, header_auth_middleware, AuthMiddlewareError};

pub use response_cache::{
    is_unsafe_method, request_disallows_caching, response_cache_middleware, ResponseCacheState,
    ResponseCacheStats, ResponseQueue,
};

//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crate::middleware::ResponseCacheState;
use crate::store::ResourceStore;

/// Application-wide state shared across all routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Backend the cached routes read from and write to.
    pub store: Arc<ResourceStore>,
    /// Response cache and coalescing queue for the API routes.
    pub cache: ResponseCacheState,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: ResourceStore, cache: ResponseCacheState) -> Self {
        Self {
            store: Arc::new(store),
            cache,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<ResourceStore>, store);
crate::impl_from_ref!(ResponseCacheState, cache);
crate::impl_from_ref!(Instant, start_time);

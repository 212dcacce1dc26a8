//! Resource REST API Routes
//!
//! Tenant-scoped CRUD over the in-memory [`ResourceStore`]. These are the
//! handlers the response cache shields: reads are coalesced and cached per
//! caller, writes invalidate the paths they touch.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    auth::CallerIdentity,
    error::{ApiError, ApiResult},
    middleware::ResponseCacheState,
    state::AppState,
    store::{Resource, ResourceStore},
};

/// Prefix every resource route lives under.
pub const RESOURCE_PREFIX: &str = "/api/v1";

// ============================================================================
// TYPES
// ============================================================================

/// Response body for list requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResourcesResponse {
    pub items: Vec<Resource>,
    pub total: usize,
}

/// Path of the collection a resource kind lives in.
pub fn collection_path(kind: &str) -> String {
    format!("{}/{}", RESOURCE_PREFIX, kind)
}

fn validate_kind(kind: &str) -> ApiResult<()> {
    let valid = !kind.is_empty()
        && kind
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::invalid_format("kind", "letters, digits, '-' or '_'"))
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/{kind} - List resources of a kind
pub async fn list_resources(
    State(store): State<Arc<ResourceStore>>,
    caller: CallerIdentity,
    Path(kind): Path<String>,
) -> ApiResult<impl IntoResponse> {
    validate_kind(&kind)?;

    let items = store.list(caller.tenant_id, &kind).await;
    let total = items.len();

    Ok(Json(ListResourcesResponse { items, total }))
}

/// POST /api/v1/{kind} - Create a resource
pub async fn create_resource(
    State(store): State<Arc<ResourceStore>>,
    caller: CallerIdentity,
    Path(kind): Path<String>,
    Json(data): Json<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    validate_kind(&kind)?;
    if !caller.is_authenticated() {
        return Err(ApiError::unauthorized("Creating resources requires a tenant"));
    }

    let resource = store.create(caller.tenant_id, &kind, data);
    tracing::debug!(tenant_id = %caller.tenant_id, kind = %kind, id = resource.id, "Created resource");

    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /api/v1/{kind}/{id} - Get resource by ID
pub async fn get_resource(
    State(store): State<Arc<ResourceStore>>,
    caller: CallerIdentity,
    Path((kind, id)): Path<(String, u64)>,
) -> ApiResult<impl IntoResponse> {
    validate_kind(&kind)?;

    let resource = store
        .get(caller.tenant_id, &kind, id)
        .await
        .ok_or_else(|| ApiError::entity_not_found(&kind, id))?;

    Ok(Json(resource))
}

/// PUT /api/v1/{kind}/{id} - Replace a resource
///
/// The cache middleware invalidates the item path; the collection listing
/// changes too, so it is dropped here.
pub async fn update_resource(
    State(store): State<Arc<ResourceStore>>,
    State(cache): State<ResponseCacheState>,
    caller: CallerIdentity,
    Path((kind, id)): Path<(String, u64)>,
    Json(data): Json<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    validate_kind(&kind)?;

    let resource = store
        .update(caller.tenant_id, &kind, id, data)
        .ok_or_else(|| ApiError::entity_not_found(&kind, id))?;
    cache.invalidate_path(&collection_path(&kind));

    Ok(Json(resource))
}

/// DELETE /api/v1/{kind}/{id} - Delete a resource
pub async fn delete_resource(
    State(store): State<Arc<ResourceStore>>,
    State(cache): State<ResponseCacheState>,
    caller: CallerIdentity,
    Path((kind, id)): Path<(String, u64)>,
) -> ApiResult<StatusCode> {
    validate_kind(&kind)?;

    if !store.delete(caller.tenant_id, &kind, id) {
        return Err(ApiError::entity_not_found(&kind, id));
    }
    cache.invalidate_path(&collection_path(&kind));

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the resource router. Routes carry their full paths so the cache
/// keys and invalidation see the same path the client sent.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{}/:kind", RESOURCE_PREFIX),
            get(list_resources).post(create_resource),
        )
        .route(
            &format!("{}/:kind/:id", RESOURCE_PREFIX),
            get(get_resource).put(update_resource).delete(delete_resource),
        )
}

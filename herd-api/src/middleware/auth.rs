//! Header-driven Authentication Middleware
//!
//! Development stand-in for a real auth service. Reads the caller's tenant,
//! role and user from request headers and injects an [`AuthContext`]:
//!
//! - no `x-tenant-id` header: the request continues anonymously
//! - a tenant or role header that is not an integer: 401
//! - no `x-role-id` header with a tenant: [`RoleId::NONE`]

use crate::auth::{AuthContext, ROLE_ID_HEADER, TENANT_ID_HEADER, USER_ID_HEADER};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use herd_core::{RoleId, TenantId};

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware that builds an [`AuthContext`] from identity headers.
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/v1/servers", get(list))
///     .layer(middleware::from_fn(header_auth_middleware));
/// ```
pub async fn header_auth_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    if let Some(auth_context) = auth_context_from_headers(request.headers())? {
        tracing::trace!(
            tenant_id = %auth_context.tenant_id,
            role_id = %auth_context.role_id,
            "Resolved caller from identity headers"
        );
        request.extensions_mut().insert(auth_context);
    }

    Ok(next.run(request).await)
}

/// Parse identity headers. `Ok(None)` means the caller is anonymous.
pub fn auth_context_from_headers(headers: &HeaderMap) -> Result<Option<AuthContext>, AuthMiddlewareError> {
    let Some(tenant_id) = parse_id_header(headers, TENANT_ID_HEADER)? else {
        return Ok(None);
    };
    let role_id = parse_id_header(headers, ROLE_ID_HEADER)?
        .map(RoleId::new)
        .unwrap_or(RoleId::NONE);

    let mut auth_context = AuthContext::new(TenantId::new(tenant_id), role_id);
    if let Some(user_id) = headers.get(USER_ID_HEADER).and_then(|h| h.to_str().ok()) {
        auth_context = auth_context.with_user_id(user_id);
    }

    Ok(Some(auth_context))
}

fn parse_id_header(headers: &HeaderMap, name: &str) -> Result<Option<i64>, AuthMiddlewareError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let parsed: ApiResult<i64> = value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|id| *id >= 0)
        .ok_or_else(|| ApiError::invalid_token(format!("{} must be a non-negative integer", name)));

    parsed.map(Some).map_err(AuthMiddlewareError)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

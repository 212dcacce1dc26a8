//! Authentication Context
//!
//! The response cache does not authenticate anyone. Some upstream layer
//! (the development [`header_auth_middleware`](crate::middleware::header_auth_middleware)
//! or a production auth service) places an [`AuthContext`] in the request
//! extensions. Everything downstream reads identity from there, and a request
//! without one is treated as anonymous.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, Extensions};
use herd_core::{Identity, RoleId, TenantId};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Header carrying the caller's tenant.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Header carrying the caller's role.
pub const ROLE_ID_HEADER: &str = "x-role-id";

/// Header carrying the caller's user identifier.
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// AUTH CONTEXT
// ============================================================================

/// Authenticated caller, as resolved by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// User identifier, when the auth layer knows one.
    pub user_id: Option<String>,

    pub tenant_id: TenantId,

    pub role_id: RoleId,
}

impl AuthContext {
    pub fn new(tenant_id: TenantId, role_id: RoleId) -> Self {
        Self {
            user_id: None,
            tenant_id,
            role_id,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The part of the context that can change a response.
    pub fn identity(&self) -> Identity {
        Identity::new(self.tenant_id, self.role_id)
    }
}

/// Read the [`AuthContext`] from request extensions, if present.
pub fn extract_auth_context(extensions: &Extensions) -> Option<&AuthContext> {
    extensions.get::<AuthContext>()
}

/// Resolve the caller identity, falling back to [`Identity::anonymous`].
///
/// A context carrying an invalid (negative) tenant resolves to the anonymous
/// identity too, so every unauthenticated caller shares one set of entries.
pub fn resolve_identity(extensions: &Extensions) -> Identity {
    extract_auth_context(extensions)
        .map(AuthContext::identity)
        .filter(Identity::is_authenticated)
        .unwrap_or_else(Identity::anonymous)
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Extractor yielding the caller identity. Never rejects: requests without an
/// [`AuthContext`] get the anonymous identity.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CallerIdentity(resolve_identity(&parts.extensions)))
    }
}

impl std::ops::Deref for CallerIdentity {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

//! Property-Based Tests for Cache Key Isolation
//!
//! For any two requests, the middleware builds the same cache key IF AND ONLY
//! IF they agree on identity, path, raw query and every key header. Keys
//! built from live request parts match keys built from their components.

use axum::http::{Request, Uri};
use herd_api::auth::AuthContext;
use herd_api::resolve_identity;
use herd_core::{CacheKey, Identity};
use herd_test_utils::generators::*;
use herd_test_utils::KeyParts;
use proptest::prelude::*;

/// Build the request the middleware would see for `parts`, when its path and
/// query form a valid URI.
fn request_for(parts: &KeyParts) -> Option<Request<()>> {
    let target = if parts.query.is_empty() {
        parts.path.clone()
    } else {
        format!("{}?{}", parts.path, parts.query)
    };
    // Without an auth context the middleware only ever sees the anonymous
    // identity.
    if !parts.identity.is_authenticated() && parts.identity != Identity::anonymous() {
        return None;
    }

    let uri: Uri = target.parse().ok()?;
    if uri.path() != parts.path || uri.query().unwrap_or("") != parts.query {
        return None;
    }

    let mut request = Request::builder().uri(uri).body(()).ok()?;
    *request.headers_mut() = parts.header_map();
    if parts.identity.is_authenticated() {
        request
            .extensions_mut()
            .insert(AuthContext::new(parts.identity.tenant_id, parts.identity.role_id));
    }
    Some(request)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Property: two requests share a key exactly when their parts match.
    #[test]
    fn prop_keys_collide_only_for_identical_parts(a in arb_key_parts(), b in arb_key_parts()) {
        if a == b {
            prop_assert_eq!(a.key(), b.key());
        } else {
            prop_assert_ne!(a.key(), b.key());
        }
    }

    /// Property: changing only the tenant always changes the key.
    #[test]
    fn prop_tenant_change_changes_key(
        parts in arb_key_parts(),
        other in arb_tenant_id(),
    ) {
        prop_assume!(other != parts.identity.tenant_id);
        let mut moved = parts.clone();
        moved.identity = Identity::new(other, parts.identity.role_id);
        prop_assert_ne!(parts.key(), moved.key());
    }

    /// Property: a key built from request parts matches one built from the
    /// resolved identity and the raw components.
    #[test]
    fn prop_http_key_matches_component_key(parts in arb_key_parts()) {
        if let Some(request) = request_for(&parts) {
            let identity = resolve_identity(request.extensions());
            let from_http = CacheKey::from_http(&identity, request.uri(), request.headers());
            prop_assert_eq!(from_http, parts.key());
        }
    }

    /// Property: invalidation sees the request path verbatim.
    #[test]
    fn prop_key_keeps_request_path(parts in arb_key_parts()) {
        let key = parts.key();
        prop_assert_eq!(key.path(), parts.path.as_str());
    }
}

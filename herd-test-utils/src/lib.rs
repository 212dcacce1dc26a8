//! HERD Test Utilities
//!
//! Shared test infrastructure for the HERD workspace:
//! - Proptest generators for identities and request parts
//! - Fixtures for common cache scenarios
//! - Assertions for cache and coalescing results

// Re-export core types for convenience
pub use herd_core::{
    CacheConfig, CacheKey, CachedResponse, ConfigError, HerdError, HerdResult,
    Identity, ManualClock, RoleId, SmallCache, TenantId, KEY_HEADERS,
};

use http::{HeaderMap, HeaderValue};

/// Request inputs a [`CacheKey`] is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    pub identity: Identity,
    pub path: String,
    pub query: String,
    /// One optional value per entry of [`KEY_HEADERS`].
    pub headers: Vec<Option<String>>,
}

impl KeyParts {
    /// Header map carrying the present key headers.
    pub fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in KEY_HEADERS.iter().zip(&self.headers) {
            if let Some(value) = value {
                if let Ok(value) = HeaderValue::from_str(value) {
                    map.insert(name.clone(), value);
                }
            }
        }
        map
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.identity, &self.path, &self.query, &self.header_map())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for HERD request inputs.

    use super::*;
    use proptest::prelude::*;

    // === Identity Generators ===

    /// Generate a tenant, including the invalid sentinel.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        prop_oneof![
            1 => Just(TenantId::INVALID),
            8 => (0i64..1_000).prop_map(TenantId::new),
        ]
    }

    /// Generate a role, including the "no role" sentinel.
    pub fn arb_role_id() -> impl Strategy<Value = RoleId> {
        prop_oneof![
            1 => Just(RoleId::NONE),
            4 => (0i64..16).prop_map(RoleId::new),
        ]
    }

    pub fn arb_identity() -> impl Strategy<Value = Identity> {
        (arb_tenant_id(), arb_role_id()).prop_map(|(tenant, role)| Identity::new(tenant, role))
    }

    // === Request Generators ===

    /// Generate a request path. Mixes realistic API paths with arbitrary
    /// printable text, quotes and backslashes included.
    pub fn arb_path() -> impl Strategy<Value = String> {
        prop_oneof![
            "(/[a-z0-9_-]{1,8}){1,4}",
            "[ -~]{0,16}",
        ]
    }

    /// Generate a raw query string (without the leading `?`).
    pub fn arb_query() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{1,6}=[a-z0-9,\"]{0,6}(&[a-z]{1,6}=[a-z0-9]{0,6}){0,2}",
            "[ -~]{0,12}",
        ]
    }

    /// Generate a key header value. `None` means the header is absent.
    pub fn arb_header_value() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[ -~]{0,12}")
    }

    /// Generate one optional value per key header.
    pub fn arb_key_headers() -> impl Strategy<Value = Vec<Option<String>>> {
        proptest::collection::vec(arb_header_value(), KEY_HEADERS.len())
    }

    pub fn arb_key_parts() -> impl Strategy<Value = KeyParts> {
        (arb_identity(), arb_path(), arb_query(), arb_key_headers()).prop_map(
            |(identity, path, query, headers)| KeyParts {
                identity,
                path,
                query,
                headers,
            },
        )
    }

    /// Generate a TTL in milliseconds, zero (disabled) included.
    pub fn arb_ttl_ms() -> impl Strategy<Value = u64> {
        prop_oneof![Just(0u64), 1u64..5_000]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixtures for common cache scenarios.

    use super::*;
    use bytes::Bytes;
    use http::{header::CONTENT_TYPE, StatusCode};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Authenticated caller in tenant 1 with role 1.
    pub fn tenant_identity() -> Identity {
        Identity::new(TenantId::new(1), RoleId::new(1))
    }

    /// Authenticated caller in tenant 2 with role 1.
    pub fn other_tenant_identity() -> Identity {
        Identity::new(TenantId::new(2), RoleId::new(1))
    }

    /// 200 JSON response captured at `captured_at`.
    pub fn json_response(captured_at: Instant, body: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        CachedResponse::new(
            captured_at,
            StatusCode::OK,
            headers,
            Bytes::from_static(body.as_bytes()),
        )
    }

    /// Key for a GET of `path` with no query and no key headers.
    pub fn plain_key(identity: &Identity, path: &str) -> CacheKey {
        CacheKey::new(identity, path, "", &HeaderMap::new())
    }

    /// Cache on a manual clock, so tests control expiry.
    pub fn manual_cache(
        ttl: Duration,
        gc_interval: Duration,
    ) -> (Arc<SmallCache>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(SmallCache::with_clock(ttl, gc_interval, clock.clone()));
        (cache, clock)
    }

    /// Config with caching and coalescing on and a short TTL.
    pub fn test_config() -> CacheConfig {
        CacheConfig::default()
            .with_ttl(Duration::from_millis(1_000))
            .with_gc_interval(Duration::from_secs(60))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for HERD results.

    use super::*;

    /// Assert that a HerdResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &HerdResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a HerdResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &HerdResult<T>) {
        match result {
            Err(HerdError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that two cached responses carry the same payload.
    #[track_caller]
    pub fn assert_same_payload(a: &CachedResponse, b: &CachedResponse) {
        assert_eq!(a.status(), b.status(), "status differs");
        assert_eq!(a.headers(), b.headers(), "headers differ");
        assert_eq!(a.body(), b.body(), "body differs");
    }
}

//! Response cache configuration.
//!
//! Loaded from environment variables with defaults suited to a short-lived
//! read cache in front of a database-backed API.

use std::time::Duration;

use crate::error::ConfigError;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_millis(1000);

/// Default minimum spacing between GC sweeps.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Default cap on a captured response body (8 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Settings for the small cache and the coalescing queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry lifetime. Zero disables caching.
    pub ttl: Duration,

    /// Minimum time between two GC sweeps.
    pub gc_interval: Duration,

    /// Whether concurrent misses for one key share a single handler call.
    pub coalescing_enabled: bool,

    /// Upper bound on how long a follower waits for its leader.
    /// `None` waits as long as the leader takes.
    pub follower_timeout: Option<Duration>,

    /// Responses with larger bodies are passed through and never cached.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            gc_interval: DEFAULT_GC_INTERVAL,
            coalescing_enabled: true,
            follower_timeout: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CacheConfig {
    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HERD_CACHE_TTL_MS`: Entry lifetime in milliseconds, 0 disables (default: 1000)
    /// - `HERD_CACHE_GC_INTERVAL_SECS`: Seconds between GC sweeps (default: 60)
    /// - `HERD_DISABLE_COALESCING`: "true" disables coalescing (default: false)
    /// - `HERD_FOLLOWER_TIMEOUT_MS`: Follower wait bound, unset or 0 for none
    /// - `HERD_CACHE_MAX_BODY_BYTES`: Largest cacheable body (default: 8 MiB)
    pub fn from_env() -> Self {
        let ttl = std::env::var("HERD_CACHE_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TTL);

        let gc_interval = std::env::var("HERD_CACHE_GC_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GC_INTERVAL);

        let coalescing_enabled = std::env::var("HERD_DISABLE_COALESCING")
            .ok()
            .map(|s| s.to_lowercase() != "true")
            .unwrap_or(true);

        let follower_timeout = std::env::var("HERD_FOLLOWER_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let max_body_bytes = std::env::var("HERD_CACHE_MAX_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        Self {
            ttl,
            gc_interval,
            coalescing_enabled,
            follower_timeout,
            max_body_bytes,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalescing_enabled = enabled;
        self
    }

    pub fn with_follower_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.follower_timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn caching_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Neither caching nor coalescing: the middleware is a pure pass-through.
    pub fn is_passthrough(&self) -> bool {
        !self.caching_enabled() && !self.coalescing_enabled
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caching_enabled() && self.gc_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "gc_interval".to_string(),
                value: format!("{:?}", self.gc_interval),
                reason: "must be non-zero when caching is enabled".to_string(),
            });
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_body_bytes".to_string(),
                value: "0".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        if !self.coalescing_enabled && self.follower_timeout.is_some() {
            return Err(ConfigError::IncompatibleOptions {
                option_a: "follower_timeout".to_string(),
                option_b: "coalescing disabled".to_string(),
            });
        }

        Ok(())
    }
}

//! API Configuration Module
//!
//! Server settings for the HERD binary. Loaded from environment variables
//! with defaults suitable for local development.

use herd_core::{CacheConfig, ConfigError};
use std::net::SocketAddr;
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default end-to-end request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host or IP to bind.
    pub bind_host: String,

    pub port: u16,

    /// Requests running longer than this are answered with 408.
    pub request_timeout: Duration,

    /// Simulated latency on every backend read (demo and load testing).
    pub backend_read_latency: Duration,

    /// Response cache and coalescing settings.
    pub cache: CacheConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backend_read_latency: Duration::ZERO,
            cache: CacheConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `HERD_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT` or `HERD_API_PORT`: Port to bind (default: 3000)
    /// - `HERD_REQUEST_TIMEOUT_SECS`: Request timeout (default: 60)
    /// - `HERD_BACKEND_READ_LATENCY_MS`: Simulated backend latency (default: 0)
    /// - plus the `HERD_CACHE_*` variables read by [`CacheConfig::from_env`]
    pub fn from_env() -> Self {
        let bind_host = std::env::var("HERD_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("HERD_API_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let request_timeout = std::env::var("HERD_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let backend_read_latency = std::env::var("HERD_BACKEND_READ_LATENCY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        Self {
            bind_host,
            port,
            request_timeout,
            backend_read_latency,
            cache: CacheConfig::from_env(),
        }
    }

    /// Resolve the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                field: "bind_host".to_string(),
                value: self.bind_host.clone(),
                reason: e.to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout".to_string(),
                value: "0s".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }

        if let Some(follower_timeout) = self.cache.follower_timeout {
            if follower_timeout > self.request_timeout {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: format!("follower_timeout ({:?})", follower_timeout),
                    option_b: format!("request_timeout ({:?})", self.request_timeout),
                });
            }
        }

        self.cache.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.socket_addr().expect("valid address"),
            "0.0.0.0:3000".parse::<SocketAddr>().expect("literal address")
        );
    }

    #[test]
    fn test_bad_bind_host() {
        let config = ApiConfig {
            bind_host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_follower_timeout_cannot_exceed_request_timeout() {
        let mut config = ApiConfig {
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        config.cache = config
            .cache
            .clone()
            .with_follower_timeout(Some(Duration::from_secs(10)));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompatibleOptions { .. })
        ));
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let config = ApiConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Error types for HERD operations

use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Errors observed by a follower waiting on a leader.
///
/// Returned by [`Follower::wait`](crate::Follower::wait). The HTTP layer
/// recovers from both by running the handler itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoalesceError {
    /// The leader finished without delivering a result (panic, cancellation,
    /// or a response that could not be captured).
    #[error("Leader abandoned the request before delivering a result")]
    LeaderAbandoned,

    #[error("Timed out after {after:?} waiting for the leader")]
    TimedOut { after: Duration },
}

/// Master error type for all HERD errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HerdError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Response capture failed: {reason}")]
    Capture { reason: String },
}

/// Result type alias for HERD operations.
pub type HerdResult<T> = Result<T, HerdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_into_herd_error() {
        let err: HerdError = ConfigError::InvalidValue {
            field: "gc_interval".to_string(),
            value: "0s".to_string(),
            reason: "must be non-zero".to_string(),
        }
        .into();

        assert!(matches!(err, HerdError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for gc_interval: 0s - must be non-zero"
        );
    }

    #[test]
    fn test_timed_out_display() {
        let err = CoalesceError::TimedOut {
            after: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Timed out after 250ms waiting for the leader");
    }
}

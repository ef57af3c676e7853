//! Error types for rate limiter construction, configuration and middleware.
//!
//! The admission path itself never fails: `try_acquire` answers `true` or
//! `false`. Errors only arise when building a limiter from bad parameters,
//! loading configuration, registering metrics, or when the tower middleware
//! turns a rejection into a request error.

use thiserror::Error;

/// Rate limiter errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// Bucket capacity must hold at least one token.
    #[error("Invalid capacity {value}: capacity must be greater than zero")]
    InvalidCapacity {
        /// Rejected value
        value: u64,
    },

    /// Each refill must credit at least one token.
    #[error("Invalid refill rate {value}: refill rate must be greater than zero")]
    InvalidRefillRate {
        /// Rejected value
        value: u32,
    },

    /// Refill interval must be at least one millisecond.
    #[error("Invalid refill interval {value}ms: refill interval must be greater than zero")]
    InvalidRefillInterval {
        /// Rejected value in milliseconds
        value: u64,
    },

    /// Configuration text or environment value could not be parsed.
    #[error("Configuration parse error: {details}")]
    ConfigParse {
        /// Error details
        details: String,
    },

    /// Configuration file could not be read.
    #[error("Failed to read configuration file {path}: {details}")]
    ConfigRead {
        /// Path that was read
        path: String,
        /// Error details
        details: String,
    },

    /// Prometheus metric creation or registration failed.
    #[error("Metrics error: {details}")]
    Metrics {
        /// Error details
        details: String,
    },

    /// The gate had no token for this request.
    #[error("Rate limit exceeded")]
    RateLimited,
}

impl From<prometheus::Error> for LimiterError {
    fn from(err: prometheus::Error) -> Self {
        LimiterError::Metrics {
            details: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LimiterError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that validation messages include the rejected value.
    #[test]
    fn test_error_messages_name_the_rejected_value() {
        let err = LimiterError::InvalidCapacity { value: 0 };
        assert_eq!(
            err.to_string(),
            "Invalid capacity 0: capacity must be greater than zero"
        );

        let err = LimiterError::InvalidRefillInterval { value: 0 };
        assert!(err.to_string().contains("0ms"));
    }

    /// Tests conversion of prometheus errors.
    #[test]
    fn test_prometheus_error_conversion() {
        let err: LimiterError = prometheus::Error::AlreadyReg.into();
        assert!(matches!(err, LimiterError::Metrics { .. }));
    }
}

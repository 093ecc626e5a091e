//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable or refusing commands.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Redis command error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis pool error.
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Invalid connection configuration.
    #[error("Store configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Build a [`StoreError::Unavailable`] from any displayable cause.
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(cause.to_string())
    }

    /// True when retrying after a reconnect may succeed.
    ///
    /// Configuration errors are permanent; everything else is a flavor of
    /// connectivity loss.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_recoverable() {
        let error = StoreError::unavailable("connection refused");
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_configuration_is_not_recoverable() {
        let error = StoreError::Configuration("bad url".to_string());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = StoreError::unavailable("timed out");
        assert_eq!(error.to_string(), "Store unavailable: timed out");

        let error = StoreError::Configuration("missing scheme".to_string());
        assert_eq!(error.to_string(), "Store configuration error: missing scheme");
    }
}

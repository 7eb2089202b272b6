//! Unified error types for the Courier core.
//!
//! Handler-level faults live in `courier-framework`; configuration errors live
//! in `courier-runtime`. This module only covers the transport boundary.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors returned by a [`Transport`](crate::Transport) call.
///
/// Every variant except [`Unauthorized`](TransportError::Unauthorized) is
/// retryable: the poll loop backs off and fetches the same range again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection-level failure (DNS, TCP, TLS, request timeout, 5xx).
    #[error("network error: {0}")]
    Network(String),

    /// The platform asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Delay suggested by the platform, if it sent one.
        retry_after: Option<Duration>,
    },

    /// The credentials were refused. Fatal for the poll loop.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The response could not be parsed.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The platform understood the request but refused it.
    #[error("request rejected ({code}): {description}")]
    Rejected {
        /// Platform error code.
        code: u16,
        /// Human-readable description from the platform.
        description: String,
    },
}

impl TransportError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a malformed-response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Creates a rate-limit error with an optional suggested delay.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Returns `true` if the error must stop the poll loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Returns `true` if the same request may be retried later.
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }

    /// Returns the platform-suggested delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short, stable name of the variant (for structured logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized(_) => "unauthorized",
            Self::Malformed(_) => "malformed",
            Self::Rejected { .. } => "rejected",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unauthorized_is_fatal() {
        assert!(TransportError::Unauthorized("bad token".into()).is_fatal());
        assert!(TransportError::network("reset").is_retryable());
        assert!(TransportError::malformed("eof").is_retryable());
        assert!(TransportError::rate_limited(None).is_retryable());
        assert!(
            TransportError::Rejected {
                code: 409,
                description: "conflict".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let err = TransportError::rate_limited(Some(Duration::from_secs(30)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(TransportError::network("x").retry_after(), None);
    }
}

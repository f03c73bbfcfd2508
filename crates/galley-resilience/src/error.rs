//! Error types for remote calls
//!
//! - [`RemoteError`] is what a collaborator reports for one attempt
//! - [`FailureClass`] is how an attempt's failure is classified
//! - [`CallError`] is what a call strategy reports after its retry loop

/// Failure of a single remote attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// HTTP-style status, when the transport reported one
    pub status: Option<u16>,
    /// Human-readable message
    pub message: String,
}

impl RemoteError {
    /// Create an error from a message
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create an error carrying a status code
    #[inline]
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Retry-eligible (5xx, connection, timeout)
    Transient,
    /// Rate or quota exhaustion
    QuotaExceeded,
    /// Anything else
    Permanent,
}

/// Terminal outcome of a call strategy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Quota exhausted on the critical path; the failover latch is now set
    #[error("quota exceeded: {0}")]
    QuotaExceeded(RemoteError),

    /// Non-retryable failure
    #[error("permanent failure: {0}")]
    Permanent(RemoteError),

    /// Transient failures used up the attempt budget
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure observed
        last: RemoteError,
    },

    /// Critical call pre-empted by the failover latch; no attempt was made
    #[error("session failover active")]
    SessionFailoverActive,

    /// Caller abandoned the call
    #[error("call cancelled")]
    Cancelled,
}

impl CallError {
    /// Whether this outcome reflects a session-level condition
    #[inline]
    #[must_use]
    pub fn is_session_event(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_) | Self::SessionFailoverActive)
    }

    /// The last remote failure, if an attempt was made
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::QuotaExceeded(e) | Self::Permanent(e) => Some(e),
            Self::RetriesExhausted { last, .. } => Some(last),
            Self::SessionFailoverActive | Self::Cancelled => None,
        }
    }
}

/// Health probe failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Probe could not determine its state
    #[error("probe failed: {0}")]
    Failed(String),
}

/// Invalid retry policy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// At least one attempt is required
    #[error("max_attempts must be at least 1")]
    NoAttempts,

    /// Delays must grow between attempts
    #[error("backoff_multiplier must be greater than 1.0 (got {0})")]
    NonIncreasingBackoff(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_error_display() {
        let err = CallError::RetriesExhausted {
            attempts: 3,
            last: RemoteError::with_status(503, "service unavailable"),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.to_string().contains("service unavailable"));
    }

    #[test]
    fn session_events() {
        assert!(CallError::SessionFailoverActive.is_session_event());
        assert!(CallError::QuotaExceeded(RemoteError::new("quota")).is_session_event());
        assert!(!CallError::Permanent(RemoteError::new("bad")).is_session_event());
        assert!(!CallError::Cancelled.is_session_event());
    }

    #[test]
    fn remote_accessor() {
        assert!(CallError::SessionFailoverActive.remote().is_none());
        let err = CallError::Permanent(RemoteError::new("bad request"));
        assert_eq!(err.remote().map(|e| e.message.as_str()), Some("bad request"));
    }
}

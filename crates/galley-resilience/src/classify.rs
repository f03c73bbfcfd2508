//! Failure classification
//!
//! Status codes win over message text. Quota wins over transient: a
//! "429 from upstream server" is a quota condition, not a retryable one.

use crate::error::{FailureClass, RemoteError};
use once_cell::sync::Lazy;
use regex::Regex;

static QUOTA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b429\b|quota|rate[\s_-]?limit|resource[\s_-]?exhausted|too many requests")
        .expect("quota pattern is valid")
});

static TRANSIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b5\d{2}\b|\bserver\b|unavailable|connection|timed?[\s_-]?out|timeout|network|reset by peer|temporar",
    )
    .expect("transient pattern is valid")
});

/// Classify a failed attempt
#[must_use]
pub fn classify(error: &RemoteError) -> FailureClass {
    match error.status {
        Some(429) => return FailureClass::QuotaExceeded,
        Some(408 | 500..=599) => return FailureClass::Transient,
        _ => {}
    }

    if QUOTA.is_match(&error.message) {
        FailureClass::QuotaExceeded
    } else if TRANSIENT.is_match(&error.message) {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn class_of(message: &str) -> FailureClass {
        classify(&RemoteError::new(message))
    }

    #[test]
    fn quota_messages() {
        for msg in [
            "429 Too Many Requests",
            "Quota exceeded for model",
            "RESOURCE_EXHAUSTED: try later",
            "rate limit reached",
            "rate-limited by upstream",
        ] {
            assert_eq!(class_of(msg), FailureClass::QuotaExceeded, "{msg}");
        }
    }

    #[test]
    fn transient_messages() {
        for msg in [
            "503 Service Unavailable",
            "internal server error",
            "connection refused",
            "request timed out",
            "deadline timeout",
            "network unreachable",
            "connection reset by peer",
        ] {
            assert_eq!(class_of(msg), FailureClass::Transient, "{msg}");
        }
    }

    #[test]
    fn permanent_messages() {
        for msg in ["invalid argument", "permission denied", "malformed schema", ""] {
            assert_eq!(class_of(msg), FailureClass::Permanent, "{msg}");
        }
    }

    #[test]
    fn server_must_be_a_whole_word() {
        for msg in ["observer field missing", "serverless function not found"] {
            assert_eq!(class_of(msg), FailureClass::Permanent, "{msg}");
        }
        for msg in ["internal server error", "Server closed the stream", "upstream server-side fault"] {
            assert_eq!(class_of(msg), FailureClass::Transient, "{msg}");
        }
    }

    #[test]
    fn quota_wins_over_transient() {
        assert_eq!(
            class_of("upstream server returned quota error"),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn status_wins_over_message() {
        assert_eq!(
            classify(&RemoteError::with_status(429, "bad gateway")),
            FailureClass::QuotaExceeded
        );
        assert_eq!(
            classify(&RemoteError::with_status(502, "invalid argument")),
            FailureClass::Transient
        );
        assert_eq!(
            classify(&RemoteError::with_status(400, "quota exceeded")),
            FailureClass::QuotaExceeded
        );
    }

    proptest! {
        #[test]
        fn any_5xx_status_is_transient(status in 500u16..600, msg in "[a-z ]{0,20}") {
            prop_assert_eq!(
                classify(&RemoteError::with_status(status, msg)),
                FailureClass::Transient
            );
        }

        #[test]
        fn quota_phrase_anywhere_is_quota(prefix in "[a-z ]{0,12}", suffix in "[a-z ]{0,12}") {
            let msg = format!("{prefix} quota {suffix}");
            prop_assert_eq!(class_of(&msg), FailureClass::QuotaExceeded);
        }
    }
}

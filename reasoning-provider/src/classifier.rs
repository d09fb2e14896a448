//! [`ErrorClassifier`] — pure mapping from a raised provider error to a
//! `{category, retryable}` pair (spec §4.3). The sole authority the arbiter
//! consults; order matters, the first matching pattern wins.

use serde::{Deserialize, Serialize};

/// The raw failure surfaced by a `generate(prompt) -> text` endpoint. The
/// opaque HTTP client is out of scope, but it hands back a status code (if
/// HTTP-shaped) and a message, which is all the classifier needs.
#[derive(Debug, Clone)]
pub struct RawProviderFailure {
    /// HTTP-like status code, if the failure came from an HTTP transport.
    pub status: Option<u16>,
    /// Free-text message or exception description.
    pub message: String,
}

impl RawProviderFailure {
    /// Build a failure from just a message (no status code known).
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Build a failure with an explicit status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// The category a failure is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    /// Provider rate-limited the request.
    RateLimit,
    /// Quota exhausted for the billing window.
    Quota,
    /// Authentication/authorization failed.
    Auth,
    /// Generic 5xx server error.
    Server,
    /// 503-shaped service-unavailable.
    ServiceUnavailable,
    /// Timeout or network reset.
    Timeout,
    /// The response could not be parsed or failed validation.
    Parse,
    /// Session-layer error (not a provider concern, but the taxonomy allows it).
    Session,
    /// Filesystem-layer error.
    Filesystem,
    /// Unclassified.
    Unknown,
}

/// The result of classifying a [`RawProviderFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The category the failure was mapped to.
    pub category: ErrorCategory,
    /// Whether retrying (possibly against another provider) might succeed.
    pub retryable: bool,
}

/// Pure mapping from a raised error to a category + retryable flag
/// (spec §4.3). Classification is by message-substring and status-code
/// inspection; order matters — the first matching pattern wins.
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a raw provider failure.
    pub fn classify(failure: &RawProviderFailure) -> Classification {
        let msg = failure.message.to_ascii_lowercase();

        // Status code first, since it's unambiguous when present.
        if failure.status == Some(429) || msg.contains("rate limit") || msg.contains("rate-limit")
        {
            return Classification {
                category: ErrorCategory::RateLimit,
                retryable: true,
            };
        }
        if msg.contains("quota") {
            return Classification {
                category: ErrorCategory::Quota,
                retryable: false,
            };
        }
        if failure.status == Some(401) || failure.status == Some(403) || msg.contains("auth") {
            return Classification {
                category: ErrorCategory::Auth,
                retryable: false,
            };
        }
        if failure.status == Some(503) || msg.contains("service unavailable") || msg.contains("unavailable")
        {
            return Classification {
                category: ErrorCategory::ServiceUnavailable,
                retryable: true,
            };
        }
        if matches!(failure.status, Some(s) if (500..600).contains(&s)) || msg.contains("server error")
        {
            return Classification {
                category: ErrorCategory::Server,
                retryable: true,
            };
        }
        if msg.contains("timeout") || msg.contains("timed out") || msg.contains("connection reset")
            || msg.contains("network")
        {
            return Classification {
                category: ErrorCategory::Timeout,
                retryable: true,
            };
        }
        if msg.contains("parse") || msg.contains("invalid json") || msg.contains("validation") {
            return Classification {
                category: ErrorCategory::Parse,
                retryable: false,
            };
        }
        if msg.contains("session") {
            return Classification {
                category: ErrorCategory::Session,
                retryable: false,
            };
        }
        if msg.contains("no such file") || msg.contains("filesystem") || msg.contains("io error") {
            return Classification {
                category: ErrorCategory::Filesystem,
                retryable: false,
            };
        }

        Classification {
            category: ErrorCategory::Unknown,
            retryable: false,
        }
    }
}

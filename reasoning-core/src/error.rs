//! The cross-cutting error taxonomy (spec §7).
//!
//! Every error kind carries a stable category prefix so a client can route
//! behavior without parsing free text (spec §6, §7).

use thiserror::Error;

/// Top-level error taxonomy. Distinct from transport (JSON-RPC) error codes —
/// `reasoning-serverd` maps these onto the transport boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReasoningError {
    /// Schema or path validation failed. Never retried.
    #[error("invalid-arguments: {field}: {message}")]
    Input {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable description of the violation.
        message: String,
    },

    /// Session lifecycle errors: not-found, busy, limit-exceeded, expired.
    #[error("session-busy: session {0} has an in-flight operation")]
    SessionBusy(String),

    /// The session id does not resolve to a live session.
    #[error("session-not-found: {0}")]
    SessionNotFound(String),

    /// `maxSessions` was already reached.
    #[error("session-limit-exceeded: at most {0} sessions may be active")]
    SessionLimitExceeded(usize),

    /// Every candidate provider was attempted and none succeeded.
    #[error("all-providers-failed: attempted {attempted:?}, last cause: {last_cause}")]
    AllProvidersFailed {
        /// Names of providers attempted, in order.
        attempted: Vec<String>,
        /// The classified cause of the last failure.
        last_cause: String,
    },

    /// No provider credential is configured at all.
    #[error("provider-not-configured: no provider credentials are set")]
    ProviderNotConfigured,

    /// A provider was rate-limited and no fallback was eligible.
    #[error("rate-limited: {0}")]
    RateLimited(String),

    /// The tournament could not generate enough distinct hypotheses.
    #[error("insufficient-hypotheses: need at least 2, got {0}")]
    InsufficientHypotheses(usize),

    /// The server is at its concurrency cap.
    #[error("server-busy: at most {0} concurrent analyses are allowed")]
    ServerBusy(usize),

    /// The per-call deadline was exceeded.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Unclassified exception. Logged with detail; circuit state unaffected.
    #[error("internal: {0}")]
    Internal(String),
}

impl ReasoningError {
    /// The stable category prefix used in transport error messages (spec §6).
    pub fn category(&self) -> &'static str {
        match self {
            ReasoningError::Input { .. } => "invalid-arguments",
            ReasoningError::SessionBusy(_) => "session-busy",
            ReasoningError::SessionNotFound(_) => "session-not-found",
            ReasoningError::SessionLimitExceeded(_) => "session-limit-exceeded",
            ReasoningError::AllProvidersFailed { .. } => "all-providers-failed",
            ReasoningError::ProviderNotConfigured => "provider-not-configured",
            ReasoningError::RateLimited(_) => "rate-limited",
            ReasoningError::InsufficientHypotheses(_) => "insufficient-hypotheses",
            ReasoningError::ServerBusy(_) => "server-busy",
            ReasoningError::Timeout(_) => "timeout",
            ReasoningError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes_are_stable() {
        assert_eq!(
            ReasoningError::SessionBusy("s1".into()).category(),
            "session-busy"
        );
        assert_eq!(
            ReasoningError::Input {
                field: "focus.files".into(),
                message: "must be non-empty".into()
            }
            .category(),
            "invalid-arguments"
        );
    }

    #[test]
    fn messages_carry_the_category_prefix() {
        let err = ReasoningError::SessionNotFound("s9".into());
        assert!(err.to_string().starts_with("session-not-found:"));
    }
}

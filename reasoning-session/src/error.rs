//! Session-scoped errors surfaced by [`crate::manager::SessionManager`].

use thiserror::Error;

/// Errors raised while starting, continuing, finalizing, or inspecting a
/// session.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another operation currently holds the session's writer lock.
    #[error("session {0} is busy")]
    Busy(String),

    /// No session exists with the given id (never created, already
    /// finalized, or expired).
    #[error("session {0} not found")]
    NotFound(String),

    /// The store is at its configured capacity.
    #[error("session limit of {0} exceeded")]
    LimitExceeded(usize),

    /// Every configured provider failed during this operation.
    #[error("all providers failed: {0}")]
    AllProvidersFailed(String),
}

impl SessionError {
    /// Stable category prefix, matching `reasoning_core::ReasoningError`'s
    /// taxonomy so the transport layer can map both uniformly.
    pub fn category(&self) -> &'static str {
        match self {
            SessionError::Busy(_) => "session-busy",
            SessionError::NotFound(_) => "session-not-found",
            SessionError::LimitExceeded(_) => "session-limit-exceeded",
            SessionError::AllProvidersFailed(_) => "all-providers-failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_have_stable_prefixes() {
        assert_eq!(SessionError::Busy("s1".into()).category(), "session-busy");
        assert_eq!(SessionError::NotFound("s1".into()).category(), "session-not-found");
        assert_eq!(SessionError::LimitExceeded(100).category(), "session-limit-exceeded");
    }
}

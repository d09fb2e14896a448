//! Errors surfaced by [`crate::dispatcher::ToolDispatcher`].

use thiserror::Error;

/// Errors raised while validating or dispatching a tool call.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// No such tool exists in the closed catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// An argument failed validation. Carries the offending field path.
    #[error("invalid argument at {field}: {message}")]
    InvalidArguments {
        /// Dotted path to the offending field, e.g. `focus.files[2]`.
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// A session-layer error, re-surfaced with its stable category.
    #[error("{0}")]
    Session(#[from] reasoning_session::SessionError),

    /// A tournament-layer error.
    #[error("{0}")]
    Tournament(#[from] reasoning_tournament::TournamentError),

    /// Every configured provider failed for a one-shot analysis call.
    #[error("{0}")]
    AllProvidersFailed(#[from] reasoning_arbiter::AllProvidersFailed),

    /// No provider is registered for the requested model name.
    #[error("unknown model: {0}")]
    UnknownModel(String),
}

impl ToolError {
    /// Stable category prefix, matching the taxonomy surfaced over the
    /// wire (spec §6, §7).
    pub fn category(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown-tool",
            ToolError::InvalidArguments { .. } => "invalid-arguments",
            ToolError::Session(e) => e.category(),
            ToolError::Tournament(_) => "tournament-failed",
            ToolError::AllProvidersFailed(_) => "all-providers-failed",
            ToolError::UnknownModel(_) => "invalid-arguments",
        }
    }
}

/// Build an [`ToolError::InvalidArguments`] for a given field/message pair.
/// Small helper so call sites in `validate` and `dispatcher` read as one
/// line instead of repeating the struct literal.
pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        field: field.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_have_stable_prefixes() {
        assert_eq!(ToolError::UnknownTool("x".into()).category(), "unknown-tool");
        assert_eq!(invalid("a", "b").category(), "invalid-arguments");
    }
}

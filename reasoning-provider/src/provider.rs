//! The [`Provider`] role contract (spec §4.4).

use crate::classifier::RawProviderFailure;
use async_trait::async_trait;
use reasoning_core::model::{AnalysisContext, AnalysisResult, AnalysisType};
use thiserror::Error;

/// Errors a [`Provider::analyze`] call may raise. Classifiable via
/// [`crate::classifier::ErrorClassifier`] at the arbiter boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The underlying `generate` call failed.
    #[error("provider call failed: {0}")]
    Generate(#[from] RawProviderFailureError),

    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

/// Wrapper so [`RawProviderFailure`] can implement `std::error::Error`
/// and participate in `#[from]` conversion.
#[derive(Debug)]
pub struct RawProviderFailureError(pub RawProviderFailure);

impl std::fmt::Display for RawProviderFailureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.message)
    }
}

impl std::error::Error for RawProviderFailureError {}

impl ProviderError {
    /// Recover the raw failure this error wraps, for classification.
    pub fn raw_failure(&self) -> RawProviderFailure {
        match self {
            ProviderError::Generate(e) => e.0.clone(),
            ProviderError::Other(msg) => RawProviderFailure::message(msg.clone()),
        }
    }
}

/// A provider's current rate-limit window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Requests remaining in the current window.
    pub remaining: u32,
    /// When the window resets.
    pub reset_at: chrono::DateTime<chrono::Utc>,
}

impl RateLimit {
    /// An effectively unbounded rate limit (used by providers that don't
    /// track one, or before the first response metadata arrives).
    pub fn unbounded() -> Self {
        Self {
            remaining: u32::MAX,
            reset_at: chrono::Utc::now(),
        }
    }

    /// Whether a call may proceed right now.
    pub fn has_capacity(&self) -> bool {
        self.remaining > 0 || chrono::Utc::now() >= self.reset_at
    }
}

/// Uniform capability every provider exposes (spec §4.4, §2).
///
/// Uses `async_trait` so the arbiter can hold a `Vec<Arc<dyn Provider>>` —
/// the object-safe boundary the whole arbitration layer is built on.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier for this provider, used in stats, logs, and
    /// `AnalysisResult.metadata.provider`.
    fn name(&self) -> &str;

    /// Small integer priority; lower is preferred. Used to order the
    /// arbiter's candidate list and for tie-breaking by name.
    fn priority(&self) -> i32;

    /// Whether this provider may currently be called: non-empty
    /// credential, rate limit available, circuit closed. The circuit and
    /// credential checks live in the arbiter/stats layer; a provider only
    /// needs to report its own rate-limit availability here.
    async fn is_available(&self) -> bool;

    /// A rough, nonnegative cost estimate for analyzing `context`, used
    /// only to compare against an optional budget cap.
    async fn estimate_cost(&self, context: &AnalysisContext) -> f64;

    /// The provider's current rate-limit window.
    async fn get_rate_limit(&self) -> RateLimit;

    /// Run an analysis. Implementations must update their own rate-limit
    /// state from response metadata (or from the raised error) before
    /// returning.
    async fn analyze(
        &self,
        context: &AnalysisContext,
        analysis_type: AnalysisType,
    ) -> Result<AnalysisResult, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_unbounded_has_capacity() {
        assert!(RateLimit::unbounded().has_capacity());
    }

    #[test]
    fn rate_limit_exhausted_before_reset_has_no_capacity() {
        let rl = RateLimit {
            remaining: 0,
            reset_at: chrono::Utc::now() + chrono::Duration::seconds(60),
        };
        assert!(!rl.has_capacity());
    }

    #[test]
    fn rate_limit_exhausted_after_reset_has_capacity() {
        let rl = RateLimit {
            remaining: 0,
            reset_at: chrono::Utc::now() - chrono::Duration::seconds(1),
        };
        assert!(rl.has_capacity());
    }
}

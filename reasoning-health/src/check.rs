//! The [`HealthCheck`] trait and its result types (spec §4.9).

use async_trait::async_trait;
use serde::Serialize;

/// Disposition reported by a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Operating normally.
    Healthy,
    /// Operating, but past a warning threshold.
    Degraded,
    /// Not operating correctly.
    Unhealthy,
}

/// The outcome of running one named check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// The check's disposition.
    pub status: CheckStatus,
    /// Free-text detail, e.g. the metric that crossed a threshold.
    pub details: String,
}

impl CheckResult {
    /// Construct a healthy result with the given detail.
    pub fn healthy(details: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Healthy,
            details: details.into(),
        }
    }

    /// Construct a degraded result with the given detail.
    pub fn degraded(details: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Degraded,
            details: details.into(),
        }
    }

    /// Construct an unhealthy result with the given detail.
    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Unhealthy,
            details: details.into(),
        }
    }
}

/// A single named health probe.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Stable name, used as the key in [`crate::registry::HealthRegistry`]
    /// and in the summary response.
    fn name(&self) -> &str;

    /// How long this check is allowed to run before it's treated as failed.
    fn timeout_ms(&self) -> u64 {
        1000
    }

    /// Run the probe.
    async fn run(&self) -> CheckResult;
}

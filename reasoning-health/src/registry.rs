//! [`HealthRegistry`] (spec §4.9): a named collection of checks, run on
//! demand or on a periodic schedule, aggregated into one summary.

use crate::check::{CheckResult, CheckStatus, HealthCheck};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between scheduled health sweeps.
pub const DEFAULT_HEALTH_INTERVAL_SECONDS: u64 = 30;

/// One check's result plus its name, as surfaced to callers.
#[derive(Debug, Clone, Serialize)]
pub struct NamedCheckResult {
    /// The check's name.
    pub name: String,
    /// Its outcome.
    pub result: CheckResult,
}

/// Aggregate disposition across every registered check (spec §4.9):
/// `healthy` iff all healthy, `degraded` iff any degraded and none
/// unhealthy, else `unhealthy`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    /// The aggregate status.
    pub status: CheckStatus,
    /// Per-check results, in registration order.
    pub checks: Vec<NamedCheckResult>,
}

fn aggregate(results: &[NamedCheckResult]) -> CheckStatus {
    if results.iter().any(|r| r.result.status == CheckStatus::Unhealthy) {
        CheckStatus::Unhealthy
    } else if results.iter().any(|r| r.result.status == CheckStatus::Degraded) {
        CheckStatus::Degraded
    } else {
        CheckStatus::Healthy
    }
}

/// Owns the named checks and runs them on demand or on a schedule.
pub struct HealthRegistry {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Register a check. Later registrations with the same name shadow
    /// earlier ones in lookup order but both still run.
    pub fn register(&mut self, check: Arc<dyn HealthCheck>) {
        self.checks.push(check);
    }

    /// Run a single named check.
    pub async fn run_one(&self, name: &str) -> Option<NamedCheckResult> {
        let check = self.checks.iter().find(|c| c.name() == name)?;
        Some(self.run_check(check).await)
    }

    /// Run every registered check and aggregate into a summary.
    pub async fn run_all(&self) -> HealthSummary {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            results.push(self.run_check(check).await);
        }
        HealthSummary {
            status: aggregate(&results),
            checks: results,
        }
    }

    async fn run_check(&self, check: &Arc<dyn HealthCheck>) -> NamedCheckResult {
        let timeout = Duration::from_millis(check.timeout_ms());
        let result = match tokio::time::timeout(timeout, check.run()).await {
            Ok(result) => result,
            Err(_) => CheckResult::unhealthy(format!("check timed out after {}ms", check.timeout_ms())),
        };
        NamedCheckResult {
            name: check.name().to_string(),
            result,
        }
    }

    /// Spawn a background task that runs every check on a fixed
    /// interval, logging the aggregate status. Returns a handle the
    /// caller can abort on shutdown.
    pub fn spawn_scheduled(self: Arc<Self>, interval_seconds: u64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
            loop {
                ticker.tick().await;
                let summary = self.run_all().await;
                tracing::info!(status = ?summary.status, "scheduled health sweep");
            }
        })
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience alias used by callers that just want a name-keyed view of
/// the most recent results without holding the registry itself.
pub type CheckMap = HashMap<String, CheckResult>;

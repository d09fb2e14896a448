//! Built-in checks (spec §4.9): process memory, startup completion, the
//! internal event-bus probe, and provider circuit-breaker state.

use crate::check::{CheckResult, HealthCheck};
use async_trait::async_trait;
use reasoning_arbiter::ProviderArbiter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sysinfo::{Pid, ProcessExt, System, SystemExt};
use tokio::sync::{mpsc, oneshot};

/// Warn threshold, as a fraction of the configured memory limit.
pub const MEMORY_WARN_FRACTION: f64 = 0.60;
/// Fail threshold, as a fraction of the configured memory limit.
pub const MEMORY_FAIL_FRACTION: f64 = 0.85;

/// Reports resident memory usage of the current process against a
/// configured limit.
pub struct MemoryCheck {
    limit_bytes: u64,
}

impl MemoryCheck {
    /// Build a check against the given limit, in bytes.
    pub fn new(limit_bytes: u64) -> Self {
        Self { limit_bytes }
    }
}

#[async_trait]
impl HealthCheck for MemoryCheck {
    fn name(&self) -> &str {
        "memory"
    }

    async fn run(&self) -> CheckResult {
        let mut system = System::new();
        let pid = Pid::from(std::process::id() as usize);
        system.refresh_process(pid);

        let used_bytes = match system.process(pid) {
            Some(process) => process.memory() * 1024,
            None => {
                return CheckResult::unhealthy("could not read process memory");
            }
        };

        let fraction = used_bytes as f64 / self.limit_bytes as f64;
        let details = format!(
            "{} / {} bytes ({:.0}% of limit)",
            used_bytes,
            self.limit_bytes,
            fraction * 100.0
        );

        if fraction > MEMORY_FAIL_FRACTION {
            CheckResult::unhealthy(details)
        } else if fraction > MEMORY_WARN_FRACTION {
            CheckResult::degraded(details)
        } else {
            CheckResult::healthy(details)
        }
    }
}

/// Fails until the server has finished initial wiring, then always
/// reports healthy. The flag is shared with whatever owns startup
/// sequencing (the `reasoning-serverd` binary).
pub struct StartupCheck {
    completed: Arc<AtomicBool>,
}

impl StartupCheck {
    /// Build a check over a shared completion flag.
    pub fn new(completed: Arc<AtomicBool>) -> Self {
        Self { completed }
    }
}

#[async_trait]
impl HealthCheck for StartupCheck {
    fn name(&self) -> &str {
        "startup"
    }

    async fn run(&self) -> CheckResult {
        if self.completed.load(Ordering::Acquire) {
            CheckResult::healthy("startup wiring complete")
        } else {
            CheckResult::unhealthy("server is still starting up")
        }
    }
}

/// A minimal internal loopback: a probe sent on `probe_tx` is expected to
/// come back on a fresh oneshot within the check's timeout, proving the
/// process's async runtime is still responsive.
pub struct EventBus {
    probe_tx: mpsc::Sender<oneshot::Sender<()>>,
}

impl EventBus {
    /// Spawn the echo loop and return a handle to it.
    pub fn spawn() -> Self {
        let (probe_tx, mut probe_rx) = mpsc::channel::<oneshot::Sender<()>>(16);
        tokio::spawn(async move {
            while let Some(reply) = probe_rx.recv().await {
                let _ = reply.send(());
            }
        });
        Self { probe_tx }
    }

    async fn probe(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.probe_tx.send(tx).await.is_err() {
            return false;
        }
        rx.await.is_ok()
    }
}

/// Checks that the internal event loop echoes a probe within a timeout.
pub struct EventBusCheck {
    bus: Arc<EventBus>,
    timeout_ms: u64,
}

impl EventBusCheck {
    /// Build a check over a shared event bus handle.
    pub fn new(bus: Arc<EventBus>, timeout_ms: u64) -> Self {
        Self { bus, timeout_ms }
    }
}

#[async_trait]
impl HealthCheck for EventBusCheck {
    fn name(&self) -> &str {
        "event-bus"
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    async fn run(&self) -> CheckResult {
        match tokio::time::timeout(
            std::time::Duration::from_millis(self.timeout_ms),
            self.bus.probe(),
        )
        .await
        {
            Ok(true) => CheckResult::healthy("probe echoed"),
            Ok(false) => CheckResult::unhealthy("probe channel closed"),
            Err(_) => CheckResult::unhealthy("probe did not echo within timeout"),
        }
    }
}

/// Degraded if any configured provider's circuit breaker is open.
pub struct ProviderAvailabilityCheck {
    arbiter: Arc<ProviderArbiter>,
}

impl ProviderAvailabilityCheck {
    /// Build a check over a shared arbiter.
    pub fn new(arbiter: Arc<ProviderArbiter>) -> Self {
        Self { arbiter }
    }
}

#[async_trait]
impl HealthCheck for ProviderAvailabilityCheck {
    fn name(&self) -> &str {
        "provider-availability"
    }

    async fn run(&self) -> CheckResult {
        let stats = self.arbiter.stats_snapshot().await;
        let open: Vec<&str> = stats
            .iter()
            .filter(|(_, s)| s.circuit.open)
            .map(|(name, _)| name.as_str())
            .collect();

        if open.is_empty() {
            CheckResult::healthy("all provider circuits closed")
        } else {
            CheckResult::degraded(format!("open circuits: {}", open.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reasoning_arbiter::ArbiterConfig;
    use reasoning_core::model::{
        AnalysisContext, AnalysisResult, AnalysisType, EnrichedContext, Findings, Focus,
        Recommendations, ResultMetadata, ResultStatus,
    };
    use reasoning_provider::{Provider, ProviderError, RateLimit, RawProviderFailure, RawProviderFailureError};

    #[tokio::test]
    async fn memory_check_reports_healthy_under_a_generous_limit() {
        let check = MemoryCheck::new(u64::MAX / 2);
        let result = check.run().await;
        assert_eq!(result.status, crate::check::CheckStatus::Healthy);
    }

    #[tokio::test]
    async fn memory_check_reports_unhealthy_under_a_tiny_limit() {
        let check = MemoryCheck::new(1);
        let result = check.run().await;
        assert_eq!(result.status, crate::check::CheckStatus::Unhealthy);
    }

    #[tokio::test]
    async fn startup_check_fails_until_flagged_complete() {
        let flag = Arc::new(AtomicBool::new(false));
        let check = StartupCheck::new(Arc::clone(&flag));
        assert_eq!(check.run().await.status, crate::check::CheckStatus::Unhealthy);
        flag.store(true, Ordering::Release);
        assert_eq!(check.run().await.status, crate::check::CheckStatus::Healthy);
    }

    #[tokio::test]
    async fn event_bus_check_echoes_successfully() {
        let bus = Arc::new(EventBus::spawn());
        let check = EventBusCheck::new(bus, 500);
        assert_eq!(check.run().await.status, crate::check::CheckStatus::Healthy);
    }

    struct AlwaysFailProvider {
        name: &'static str,
    }

    #[async_trait]
    impl Provider for AlwaysFailProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            0
        }
        async fn is_available(&self) -> bool {
            true
        }
        async fn estimate_cost(&self, _context: &AnalysisContext) -> f64 {
            0.0
        }
        async fn get_rate_limit(&self) -> RateLimit {
            RateLimit::unbounded()
        }
        async fn analyze(
            &self,
            _context: &AnalysisContext,
            _analysis_type: AnalysisType,
        ) -> Result<AnalysisResult, ProviderError> {
            Err(ProviderError::Generate(RawProviderFailureError(RawProviderFailure {
                status: Some(503),
                message: "service unavailable".to_string(),
            })))
        }
    }

    fn ctx() -> AnalysisContext {
        AnalysisContext {
            attempted_approaches: vec![],
            partial_findings: vec![],
            stuck_points: vec![],
            focus: Focus {
                files: vec!["a.rs".into()],
                entry_points: None,
                service_names: None,
            },
            budget_remaining_seconds: None,
        }
    }

    #[tokio::test]
    async fn provider_availability_degrades_once_a_circuit_opens() {
        let arbiter = Arc::new(ProviderArbiter::new(
            vec![Arc::new(AlwaysFailProvider { name: "p1" })],
            None,
            ArbiterConfig {
                circuit_failure_threshold: 1,
                ..ArbiterConfig::default()
            },
        ));
        let check = ProviderAvailabilityCheck::new(Arc::clone(&arbiter));
        assert_eq!(check.run().await.status, crate::check::CheckStatus::Healthy);

        let _ = arbiter.analyze(&ctx(), AnalysisType::General, None).await;

        assert_eq!(check.run().await.status, crate::check::CheckStatus::Degraded);
    }
}

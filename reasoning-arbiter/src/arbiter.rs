//! [`ProviderArbiter`] (spec §4.5): selects and invokes a provider,
//! implementing the deterministic fallback chain, circuit breaker, and
//! per-provider statistics.

use chrono::Utc;
use reasoning_cache::{should_bypass, ReasoningCache};
use reasoning_core::model::{AnalysisContext, AnalysisResult, AnalysisType, CircuitState, ProviderStats};
use reasoning_provider::{ErrorCategory, ErrorClassifier, Provider};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default consecutive-failure threshold before a provider's circuit opens.
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 3;
/// Default seconds an open circuit stays open before a retry is allowed.
pub const DEFAULT_CIRCUIT_RESET_SECONDS: i64 = 60;

/// Terminal failure returned when every candidate provider was exhausted.
#[derive(Debug, Clone)]
pub struct AllProvidersFailed {
    /// Providers attempted, in the order they were tried.
    pub attempted: Vec<String>,
    /// The last classified failure cause, if any provider was tried.
    pub last_cause: Option<String>,
}

impl std::fmt::Display for AllProvidersFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "all providers failed; attempted [{}]; last cause: {}",
            self.attempted.join(", "),
            self.last_cause.as_deref().unwrap_or("none")
        )
    }
}

impl std::error::Error for AllProvidersFailed {}

/// Tunables for arbitration, all with spec-documented defaults.
#[derive(Debug, Clone, Copy)]
pub struct ArbiterConfig {
    /// Consecutive classified-retryable failures before a circuit opens.
    pub circuit_failure_threshold: u32,
    /// Seconds an open circuit stays open before a retry is attempted.
    pub circuit_reset_seconds: i64,
    /// Optional ceiling on `estimate_cost`; providers above it are skipped.
    pub cost_budget: Option<f64>,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            circuit_failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            circuit_reset_seconds: DEFAULT_CIRCUIT_RESET_SECONDS,
            cost_budget: None,
        }
    }
}

#[derive(Default)]
struct Bookkeeping {
    stats: HashMap<String, ProviderStats>,
    consecutive_service_unavailable: HashMap<String, u32>,
}

/// Ordered priority list of providers; selects the first eligible one,
/// advances on classified-retryable failure, records stats, and opens a
/// per-provider circuit breaker after repeated failures.
///
/// `SessionStore`, `ProviderArbiter` stats, `ReasoningCache`, and
/// `HealthRegistry` are process-wide singletons (spec §5); this struct is
/// meant to be wrapped in an `Arc` and shared.
pub struct ProviderArbiter {
    providers: Vec<Arc<dyn Provider>>,
    cache: Option<Arc<ReasoningCache>>,
    config: ArbiterConfig,
    book: RwLock<Bookkeeping>,
}

impl ProviderArbiter {
    /// Build an arbiter over `providers`, with an optional front-line cache.
    pub fn new(providers: Vec<Arc<dyn Provider>>, cache: Option<Arc<ReasoningCache>>, config: ArbiterConfig) -> Self {
        Self {
            providers,
            cache,
            config,
            book: RwLock::new(Bookkeeping::default()),
        }
    }

    /// Snapshot of per-provider statistics, for health checks and the
    /// memory protocol's checkpoints.
    pub async fn stats_snapshot(&self) -> HashMap<String, ProviderStats> {
        self.book.read().await.stats.clone()
    }

    /// Candidates ordered ascending by priority; ties broken by
    /// lexicographic name (spec §4.5's "Tie-breaks... resolved by
    /// lexicographic name").
    fn ordered_candidates(&self) -> Vec<Arc<dyn Provider>> {
        let mut candidates: Vec<Arc<dyn Provider>> = self.providers.clone();
        candidates.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));
        candidates
    }

    async fn circuit_allows(&self, name: &str) -> bool {
        let book = self.book.read().await;
        match book.stats.get(name) {
            Some(stats) if stats.circuit.open => match stats.circuit.reset_at {
                Some(reset_at) => Utc::now() >= reset_at,
                None => false,
            },
            _ => true,
        }
    }

    async fn record_success(&self, name: &str, duration_ms: u64) {
        let mut book = self.book.write().await;
        let stats = book.stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_duration_ms += duration_ms;
        stats.last_success_at = Some(Utc::now());
        stats.circuit = CircuitState::default();
        book.consecutive_service_unavailable.insert(name.to_string(), 0);
    }

    async fn record_failure(&self, name: &str, category: ErrorCategory) {
        let mut book = self.book.write().await;
        let threshold = self.config.circuit_failure_threshold;
        let reset_seconds = self.config.circuit_reset_seconds;

        let service_unavailable_hits = if category == ErrorCategory::ServiceUnavailable {
            let counter = book
                .consecutive_service_unavailable
                .entry(name.to_string())
                .or_insert(0);
            *counter += 1;
            *counter
        } else {
            book.consecutive_service_unavailable.insert(name.to_string(), 0);
            0
        };

        let stats = book.stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.failures += 1;

        let retryable = matches!(
            category,
            ErrorCategory::RateLimit
                | ErrorCategory::Server
                | ErrorCategory::ServiceUnavailable
                | ErrorCategory::Timeout
        );
        if retryable {
            stats.circuit.consecutive_failures += 1;
        }

        // A repeated service-unavailable hit opens the breaker immediately,
        // regardless of the general threshold (spec §4.5).
        let should_open = service_unavailable_hits >= 2 || stats.circuit.consecutive_failures >= threshold;
        if should_open && !stats.circuit.open {
            tracing::warn!(provider = name, "opening circuit breaker");
            stats.circuit.open = true;
            stats.circuit.reset_at = Some(Utc::now() + chrono::Duration::seconds(reset_seconds));
        }
    }

    /// Run the selection + fallback algorithm for one request. `cache_key`,
    /// when given, is consulted first and populated on a cacheable success.
    pub async fn analyze(
        &self,
        context: &AnalysisContext,
        analysis_type: AnalysisType,
        cache_key: Option<&str>,
    ) -> Result<AnalysisResult, AllProvidersFailed> {
        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            if let Some(mut cached) = cache.get(key).await {
                cached.metadata.from_cache = true;
                return Ok(cached);
            }
        }

        let mut attempted = Vec::new();
        let mut last_cause = None;

        for provider in self.ordered_candidates() {
            let name = provider.name().to_string();

            if !provider.is_available().await {
                continue;
            }
            if !self.circuit_allows(&name).await {
                continue;
            }
            let rate_limit = provider.get_rate_limit().await;
            if !rate_limit.has_capacity() {
                continue;
            }
            if let Some(budget) = self.config.cost_budget {
                if provider.estimate_cost(context).await > budget {
                    continue;
                }
            }

            attempted.push(name.clone());
            let started = std::time::Instant::now();
            match provider.analyze(context, analysis_type).await {
                Ok(mut result) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    self.record_success(&name, duration_ms).await;
                    result.metadata.fallback_used = attempted.len() > 1;

                    if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                        if !should_bypass(context, &result) {
                            cache.put(key.to_string(), result.clone()).await;
                        }
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let classification = ErrorClassifier::classify(&e.raw_failure());
                    tracing::debug!(
                        provider = %name,
                        category = ?classification.category,
                        retryable = classification.retryable,
                        "provider call failed"
                    );
                    self.record_failure(&name, classification.category).await;
                    last_cause = Some(format!("{:?}: {}", classification.category, e));
                    if !classification.retryable {
                        continue;
                    }
                }
            }
        }

        Err(AllProvidersFailed { attempted, last_cause })
    }
}

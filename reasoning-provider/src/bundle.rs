//! [`MultiModelBundleProvider`] — a [`Provider`] that fans an analysis out
//! to several inner providers concurrently and keeps the highest-confidence
//! result, the way the teacher's `LocalOrch::dispatch_many` fans tasks out
//! across `tokio::spawn` handles and collects every outcome.

use crate::classifier::RawProviderFailure;
use crate::provider::{Provider, ProviderError, RateLimit, RawProviderFailureError};
use async_trait::async_trait;
use reasoning_core::model::{AnalysisContext, AnalysisResult, AnalysisType};
use std::sync::Arc;

/// Fans an analysis out across `inner` providers concurrently and merges
/// the outcomes by keeping the one with the highest confidence. Presents
/// as a single [`Provider`] to the arbiter — useful for bundling a family
/// of models behind one name and letting the best answer win.
pub struct MultiModelBundleProvider {
    name: String,
    priority: i32,
    inner: Vec<Arc<dyn Provider>>,
}

impl MultiModelBundleProvider {
    /// Build a bundle from a list of inner providers. An empty bundle is
    /// always unavailable and fails fast on `analyze`.
    pub fn new(name: impl Into<String>, priority: i32, inner: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            name: name.into(),
            priority,
            inner,
        }
    }
}

/// Highest root-cause confidence in `result`, or `0.0` if it has none —
/// the ranking signal used to pick a winner among bundle members.
fn confidence_of(result: &AnalysisResult) -> f64 {
    result
        .findings
        .root_causes
        .iter()
        .map(|rc| rc.confidence)
        .fold(0.0_f64, f64::max)
}

#[async_trait]
impl Provider for MultiModelBundleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn is_available(&self) -> bool {
        for p in &self.inner {
            if p.is_available().await {
                return true;
            }
        }
        false
    }

    async fn estimate_cost(&self, context: &AnalysisContext) -> f64 {
        let mut total = 0.0;
        for p in &self.inner {
            total += p.estimate_cost(context).await;
        }
        total
    }

    async fn get_rate_limit(&self) -> RateLimit {
        // Report the most permissive window among available members.
        let mut best = RateLimit {
            remaining: 0,
            reset_at: chrono::Utc::now(),
        };
        for p in &self.inner {
            let rl = p.get_rate_limit().await;
            if rl.remaining > best.remaining {
                best = rl;
            }
        }
        best
    }

    async fn analyze(
        &self,
        context: &AnalysisContext,
        analysis_type: AnalysisType,
    ) -> Result<AnalysisResult, ProviderError> {
        if self.inner.is_empty() {
            return Err(ProviderError::Generate(RawProviderFailureError(
                RawProviderFailure::message("bundle has no inner providers"),
            )));
        }

        let mut handles = Vec::with_capacity(self.inner.len());
        for p in &self.inner {
            if !p.is_available().await {
                continue;
            }
            let p = Arc::clone(p);
            let context = context.clone();
            handles.push(tokio::spawn(async move {
                p.analyze(&context, analysis_type).await
            }));
        }

        if handles.is_empty() {
            return Err(ProviderError::Generate(RawProviderFailureError(
                RawProviderFailure::message("no bundle member was available"),
            )));
        }

        let mut best: Option<AnalysisResult> = None;
        let mut last_err = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(result)) => {
                    let replace = match &best {
                        Some(current) => confidence_of(&result) > confidence_of(current),
                        None => true,
                    };
                    if replace {
                        best = Some(result);
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(provider = %self.name, error = %e, "bundle member failed");
                    last_err = Some(e);
                }
                Err(join_err) => {
                    tracing::warn!(provider = %self.name, error = %join_err, "bundle member task panicked");
                }
            }
        }

        match best {
            Some(mut result) => {
                result.metadata.fallback_used = last_err.is_some();
                Ok(result)
            }
            None => Err(last_err.unwrap_or_else(|| {
                ProviderError::Generate(RawProviderFailureError(RawProviderFailure::message(
                    "all bundle members failed",
                )))
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RateLimit as RL;
    use reasoning_core::model::{
        EnrichedContext, Findings, Focus, Recommendations, ResultMetadata, ResultStatus, RootCause,
    };

    struct FakeProvider {
        name: &'static str,
        available: bool,
        result: Result<f64, String>,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            0
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn estimate_cost(&self, _context: &AnalysisContext) -> f64 {
            0.01
        }

        async fn get_rate_limit(&self) -> RateLimit {
            RL::unbounded()
        }

        async fn analyze(
            &self,
            _context: &AnalysisContext,
            _analysis_type: AnalysisType,
        ) -> Result<AnalysisResult, ProviderError> {
            match self.result {
                Ok(confidence) => Ok(AnalysisResult {
                    status: ResultStatus::Success,
                    findings: Findings {
                        root_causes: vec![RootCause {
                            kind: "bug".into(),
                            description: "d".into(),
                            evidence: vec![],
                            confidence,
                            fix_strategy: "f".into(),
                        }],
                        ..Default::default()
                    },
                    recommendations: Recommendations::default(),
                    enriched_context: EnrichedContext::default(),
                    metadata: ResultMetadata {
                        provider: self.name.to_string(),
                        ..ResultMetadata::default()
                    },
                }),
                Err(ref msg) => Err(ProviderError::Other(msg.clone())),
            }
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
    async fn keeps_the_highest_confidence_member() {
        let bundle = MultiModelBundleProvider::new(
            "bundle",
            0,
            vec![
                Arc::new(FakeProvider {
                    name: "fast",
                    available: true,
                    result: Ok(0.4),
                }),
                Arc::new(FakeProvider {
                    name: "accurate",
                    available: true,
                    result: Ok(0.9),
                }),
            ],
        );
        let result = bundle.analyze(&ctx(), AnalysisType::General).await.unwrap();
        assert_eq!(result.metadata.provider, "accurate");
    }

    #[tokio::test]
    async fn skips_unavailable_members() {
        let bundle = MultiModelBundleProvider::new(
            "bundle",
            0,
            vec![
                Arc::new(FakeProvider {
                    name: "fast",
                    available: false,
                    result: Ok(0.9),
                }),
                Arc::new(FakeProvider {
                    name: "slow",
                    available: true,
                    result: Ok(0.5),
                }),
            ],
        );
        let result = bundle.analyze(&ctx(), AnalysisType::General).await.unwrap();
        assert_eq!(result.metadata.provider, "slow");
    }

    #[tokio::test]
    async fn all_members_unavailable_is_overall_unavailable() {
        let bundle = MultiModelBundleProvider::new(
            "bundle",
            0,
            vec![Arc::new(FakeProvider {
                name: "fast",
                available: false,
                result: Ok(0.1),
            })],
        );
        assert!(!bundle.is_available().await);
    }

    #[tokio::test]
    async fn empty_bundle_fails_fast() {
        let bundle = MultiModelBundleProvider::new("bundle", 0, vec![]);
        assert!(bundle.analyze(&ctx(), AnalysisType::General).await.is_err());
    }

    #[tokio::test]
    async fn all_members_failing_surfaces_last_error() {
        let bundle = MultiModelBundleProvider::new(
            "bundle",
            0,
            vec![Arc::new(FakeProvider {
                name: "fast",
                available: true,
                result: Err("boom".into()),
            })],
        );
        let err = bundle.analyze(&ctx(), AnalysisType::General).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}

//! [`GenericHttpProvider`] — a [`Provider`] that assembles a prompt, calls
//! an opaque `generate(prompt) -> text` endpoint, and parses the response.
//!
//! The HTTP client itself is out of scope (spec §1); callers supply a
//! [`GenerateFn`] trait object wrapping whatever transport they use.

use crate::classifier::RawProviderFailure;
use crate::provider::{Provider, ProviderError, RateLimit, RawProviderFailureError};
use crate::reader::CodeReader;
use async_trait::async_trait;
use reasoning_core::model::{AnalysisContext, AnalysisResult, AnalysisType};
use reasoning_prompt::{PromptAssembler, ResponseParser};
use std::sync::Arc;
use tokio::sync::Mutex;

/// An opaque `generate(prompt) -> text` endpoint. The concrete HTTP client
/// for a real provider (Anthropic, OpenAI, ...) implements this.
#[async_trait]
pub trait GenerateFn: Send + Sync {
    /// Send `prompt` to the backing model and return its raw text output.
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, RawProviderFailure>;
}

/// Metadata returned alongside generated text.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// The model's raw text output.
    pub text: String,
    /// Tokens consumed, if the endpoint reports it.
    pub tokens_used: Option<u64>,
    /// Cost in USD, if the endpoint reports it.
    pub cost: Option<f64>,
    /// Remaining rate-limit budget, if the endpoint reports it.
    pub rate_limit_remaining: Option<u32>,
    /// When the rate-limit window resets, if reported.
    pub rate_limit_reset_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A [`Provider`] backed by a generic `generate(prompt) -> text` endpoint.
///
/// Generalizes the teacher's per-vendor HTTP clients (`neuron-provider-*`)
/// behind the spec's single opaque `generate` boundary — concrete vendor
/// wiring happens outside this workspace.
pub struct GenericHttpProvider {
    name: String,
    priority: i32,
    has_credential: bool,
    generate: Arc<dyn GenerateFn>,
    reader: Arc<dyn CodeReader>,
    assembler: PromptAssembler,
    rate_limit: Mutex<RateLimit>,
}

impl GenericHttpProvider {
    /// Construct a provider. `has_credential` models spec §4.4's
    /// "non-empty credential" availability gate — callers pass `false` when
    /// the corresponding API key environment variable was unset.
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        has_credential: bool,
        generate: Arc<dyn GenerateFn>,
        reader: Arc<dyn CodeReader>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            has_credential,
            generate,
            reader,
            assembler: PromptAssembler::default(),
            rate_limit: Mutex::new(RateLimit::unbounded()),
        }
    }
}

fn analysis_query(analysis_type: AnalysisType, context: &AnalysisContext) -> String {
    format!(
        "Analysis type: {}. Stuck points: {}.",
        analysis_type.as_str(),
        context.stuck_points.join("; ")
    )
}

#[async_trait]
impl Provider for GenericHttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn is_available(&self) -> bool {
        if !self.has_credential {
            return false;
        }
        self.rate_limit.lock().await.has_capacity()
    }

    async fn estimate_cost(&self, context: &AnalysisContext) -> f64 {
        let file_count = context.focus.files.len() as f64;
        // Rough heuristic: a fixed per-call cost plus a per-file surcharge.
        0.01 + file_count * 0.002
    }

    async fn get_rate_limit(&self) -> RateLimit {
        *self.rate_limit.lock().await
    }

    async fn analyze(
        &self,
        context: &AnalysisContext,
        analysis_type: AnalysisType,
    ) -> Result<AnalysisResult, ProviderError> {
        let files = self
            .reader
            .read_files(&context.focus.files)
            .await
            .map_err(|e| ProviderError::Other(e.to_string()))?;

        let query = analysis_query(analysis_type, context);
        let prompt = self.assembler.assemble(context, analysis_type, &files, &query);

        tracing::debug!(provider = %self.name, "calling generate endpoint");
        let started = std::time::Instant::now();
        let response = self.generate.generate(&prompt).await.map_err(|failure| {
            ProviderError::Generate(RawProviderFailureError(failure))
        })?;

        if let (Some(remaining), Some(reset_at)) =
            (response.rate_limit_remaining, response.rate_limit_reset_at)
        {
            let mut rl = self.rate_limit.lock().await;
            rl.remaining = remaining;
            rl.reset_at = reset_at;
        }

        let mut result = ResponseParser::parse(&response.text, &context.attempted_approaches);
        result.metadata.provider = self.name.clone();
        result.metadata.tokens_used = response.tokens_used;
        result.metadata.cost = response.cost;
        result.metadata.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::InMemoryCodeReader;
    use reasoning_core::model::Focus;
    use std::collections::BTreeMap;

    struct StubGenerate {
        response: Result<GenerateResponse, RawProviderFailure>,
    }

    #[async_trait]
    impl GenerateFn for StubGenerate {
        async fn generate(&self, _prompt: &str) -> Result<GenerateResponse, RawProviderFailure> {
            self.response.clone()
        }
    }

    impl Clone for GenerateResponse {
        fn clone(&self) -> Self {
            Self {
                text: self.text.clone(),
                tokens_used: self.tokens_used,
                cost: self.cost,
                rate_limit_remaining: self.rate_limit_remaining,
                rate_limit_reset_at: self.rate_limit_reset_at,
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
    async fn unavailable_without_credential() {
        let provider = GenericHttpProvider::new(
            "primary",
            0,
            false,
            Arc::new(StubGenerate {
                response: Ok(GenerateResponse::default()),
            }),
            Arc::new(InMemoryCodeReader::default()),
        );
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn analyze_parses_successful_response() {
        let provider = GenericHttpProvider::new(
            "primary",
            0,
            true,
            Arc::new(StubGenerate {
                response: Ok(GenerateResponse {
                    text: r#"{"status": "success", "findings": {}}"#.to_string(),
                    tokens_used: Some(42),
                    cost: Some(0.02),
                    rate_limit_remaining: Some(10),
                    rate_limit_reset_at: Some(chrono::Utc::now()),
                }),
            }),
            Arc::new(InMemoryCodeReader::new(BTreeMap::from([(
                "a.rs".to_string(),
                "fn main() {}".to_string(),
            )]))),
        );

        let result = provider.analyze(&ctx(), AnalysisType::General).await.unwrap();
        assert_eq!(result.metadata.provider, "primary");
        assert_eq!(result.metadata.tokens_used, Some(42));
    }

    #[tokio::test]
    async fn analyze_propagates_generate_failure() {
        let provider = GenericHttpProvider::new(
            "primary",
            0,
            true,
            Arc::new(StubGenerate {
                response: Err(RawProviderFailure::with_status(503, "down")),
            }),
            Arc::new(InMemoryCodeReader::default()),
        );
        let err = provider.analyze(&ctx(), AnalysisType::General).await.unwrap_err();
        assert!(err.to_string().contains("down"));
    }
}

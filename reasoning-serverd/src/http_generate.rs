//! [`HttpGenerateFn`] — the concrete `generate(prompt) -> text` endpoint
//! that backs a [`GenericHttpProvider`](reasoning_provider::GenericHttpProvider)
//! in this binary. Speaks a minimal vendor-neutral JSON contract (`{model,
//! prompt} -> {text, tokens_used, cost_usd}`) rather than any one real
//! vendor's wire format, the way `GenericHttpProvider` itself stays opaque
//! to the concrete transport (spec §4.4).

use async_trait::async_trait;
use reasoning_provider::{GenerateFn, GenerateResponse, RawProviderFailure};
use std::time::Duration;

/// Posts `{model, prompt}` to a configured endpoint and parses back
/// `{text, tokens_used, cost_usd}`. Modeled on the teacher's
/// `neuron-provider-anthropic::Anthropic` client: a shared `reqwest::Client`,
/// bearer auth, and reqwest/status-code error mapping into the classifier's
/// `RawProviderFailure` shape.
pub struct HttpGenerateFn {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpGenerateFn {
    /// Build a generate endpoint over `endpoint`, sending `model` on every
    /// request and authenticating with `api_key`.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RawProviderFailure {
    if err.is_timeout() {
        RawProviderFailure::message("request timed out")
    } else if err.is_connect() {
        RawProviderFailure::message(format!("connection error: {err}"))
    } else {
        RawProviderFailure::message(err.to_string())
    }
}

#[async_trait]
impl GenerateFn for HttpGenerateFn {
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, RawProviderFailure> {
        let body = serde_json::json!({ "model": self.model, "prompt": prompt });

        tracing::debug!(endpoint = %self.endpoint, model = %self.model, "calling generate endpoint");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(120))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(RawProviderFailure::with_status(status.as_u16(), text));
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| RawProviderFailure::message(format!("invalid JSON response: {e}")))?;

        Ok(GenerateResponse {
            text: parsed.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            tokens_used: parsed.get("tokens_used").and_then(|v| v.as_u64()),
            cost: parsed.get("cost_usd").and_then(|v| v.as_f64()),
            rate_limit_remaining: parsed
                .get("rate_limit_remaining")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
            rate_limit_reset_at: None,
        })
    }
}

//! [`ToolDispatcher`] (spec §4.8): validates arguments against the closed
//! tool catalog and routes to the right subsystem.

use crate::error::{invalid, ToolError};
use crate::models::{ModelInfo, ModelRegistry};
use crate::validate::{
    validate_array_len, validate_paths, validate_stuck_points, validate_text_len,
    MAX_HYPOTHESIS_CHARS, MAX_TEXT_CHARS,
};
use reasoning_arbiter::ProviderArbiter;
use reasoning_cache::fingerprint;
use reasoning_core::id::SessionId;
use reasoning_core::model::{AnalysisContext, AnalysisResult, AnalysisType, TournamentConfig};
use reasoning_health::{HealthRegistry, HealthSummary};
use reasoning_session::{ContinueResponse, FinalizeFormat, SessionManager, StartResponse, StatusResponse};
use reasoning_tournament::TournamentEngine;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds the arbiter cache key for a one-shot call. The dispatcher has no
/// `CodeReader` of its own (that lives inside each `Provider`), so it
/// fingerprints on file paths rather than file content hashes; a content
/// edit that keeps the same path set will hit a stale cache entry until it
/// expires.
fn cache_key(analysis_type: AnalysisType, context: &AnalysisContext) -> String {
    fingerprint(analysis_type, &context.focus.files, &context.stuck_points.join("; "))
}

fn validate_context(context: &AnalysisContext, workspace_root: &Path) -> Result<(), ToolError> {
    validate_paths("focus.files", &context.focus.files, workspace_root)?;
    if context.focus.files.is_empty() {
        return Err(invalid("focus.files", "must be non-empty"));
    }
    validate_array_len(
        "attempted_approaches",
        &context.attempted_approaches,
        crate::validate::MAX_ARRAY_ITEMS,
    )?;
    for (i, approach) in context.attempted_approaches.iter().enumerate() {
        validate_text_len(&format!("attempted_approaches[{}]", i), approach, MAX_TEXT_CHARS)?;
    }
    validate_stuck_points("stuck_points", &context.stuck_points)
}

#[derive(Debug, Deserialize)]
struct OneShotArgs {
    context: AnalysisContext,
}

#[derive(Debug, Deserialize)]
struct HypothesisTestArgs {
    context: AnalysisContext,
    hypothesis: String,
}

#[derive(Debug, Deserialize)]
struct StartConversationArgs {
    analysis_type: AnalysisType,
    context: AnalysisContext,
    #[serde(default)]
    initial_question: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContinueConversationArgs {
    session_id: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeConversationArgs {
    session_id: String,
    #[serde(default = "default_finalize_format")]
    format: FinalizeFormat,
}

fn default_finalize_format() -> FinalizeFormat {
    FinalizeFormat::Detailed
}

#[derive(Debug, Deserialize)]
struct SessionIdArgs {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct TournamentArgs {
    context: AnalysisContext,
    issue: String,
    #[serde(default)]
    config: Option<TournamentConfig>,
}

#[derive(Debug, Deserialize)]
struct HealthCheckArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SetModelArgs {
    name: String,
}

fn parse<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| invalid(tool, e.to_string()))
}

/// Dispatches validated tool calls to the subsystem that owns them (spec
/// §4.8's table). Built over the same process-wide singletons as the
/// rest of the server.
pub struct ToolDispatcher {
    arbiter: Arc<ProviderArbiter>,
    sessions: SessionManager,
    tournaments: TournamentEngine,
    health: Arc<HealthRegistry>,
    models: ModelRegistry,
    workspace_root: PathBuf,
}

impl ToolDispatcher {
    /// Wire a dispatcher over the server's shared components. `workspace_root`
    /// is the directory every tool-supplied file path must resolve inside of.
    pub fn new(
        arbiter: Arc<ProviderArbiter>,
        sessions: SessionManager,
        tournaments: TournamentEngine,
        health: Arc<HealthRegistry>,
        models: ModelRegistry,
        workspace_root: PathBuf,
    ) -> Self {
        Self {
            arbiter,
            sessions,
            tournaments,
            health,
            models,
            workspace_root,
        }
    }

    /// Validate and run one tool call, returning its result as JSON.
    pub async fn dispatch(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        match tool {
            "escalate_analysis" => self.one_shot(tool, args, AnalysisType::General).await,
            "trace_execution_path" => self.one_shot(tool, args, AnalysisType::ExecutionTrace).await,
            "cross_system_impact" => self.one_shot(tool, args, AnalysisType::CrossSystem).await,
            "performance_bottleneck" => self.one_shot(tool, args, AnalysisType::Performance).await,
            "hypothesis_test" => self.hypothesis_test(args).await,
            "start_conversation" => self.start_conversation(args).await,
            "continue_conversation" => self.continue_conversation(args).await,
            "finalize_conversation" => self.finalize_conversation(args).await,
            "get_conversation_status" => self.get_conversation_status(args).await,
            "run_hypothesis_tournament" => self.run_hypothesis_tournament(args).await,
            "health_check" => self.health_check(args).await,
            "health_summary" => self.health_summary().await,
            "get_model_info" => self.get_model_info().await,
            "set_model" => self.set_model(args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn one_shot(&self, tool: &str, args: Value, analysis_type: AnalysisType) -> Result<Value, ToolError> {
        let args: OneShotArgs = parse(tool, args)?;
        validate_context(&args.context, &self.workspace_root)?;
        let key = cache_key(analysis_type, &args.context);
        let result = self.arbiter.analyze(&args.context, analysis_type, Some(&key)).await?;
        Ok(serde_json::to_value(result).expect("AnalysisResult always serializes"))
    }

    async fn hypothesis_test(&self, args: Value) -> Result<Value, ToolError> {
        let args: HypothesisTestArgs = parse("hypothesis_test", args)?;
        validate_context(&args.context, &self.workspace_root)?;
        validate_text_len("hypothesis", &args.hypothesis, MAX_HYPOTHESIS_CHARS)?;

        let mut context = args.context;
        context
            .attempted_approaches
            .push(format!("Test this hypothesis: {}", args.hypothesis));

        let key = cache_key(AnalysisType::HypothesisTest, &context);
        let result = self
            .arbiter
            .analyze(&context, AnalysisType::HypothesisTest, Some(&key))
            .await?;
        Ok(serde_json::to_value(result).expect("AnalysisResult always serializes"))
    }

    async fn start_conversation(&self, args: Value) -> Result<Value, ToolError> {
        let args: StartConversationArgs = parse("start_conversation", args)?;
        validate_context(&args.context, &self.workspace_root)?;
        if let Some(question) = &args.initial_question {
            validate_text_len("initial_question", question, MAX_TEXT_CHARS)?;
        }
        let response: StartResponse = self
            .sessions
            .start(args.analysis_type, args.context, args.initial_question)
            .await?;
        Ok(serde_json::json!({
            "session_id": response.session_id.as_str(),
            "initial_response": response.initial_response,
            "suggested_follow_ups": response.suggested_follow_ups,
        }))
    }

    async fn continue_conversation(&self, args: Value) -> Result<Value, ToolError> {
        let args: ContinueConversationArgs = parse("continue_conversation", args)?;
        validate_text_len("message", &args.message, MAX_TEXT_CHARS)?;
        let id = SessionId::new(args.session_id);
        let response: ContinueResponse = self.sessions.continue_turn(&id, args.message).await?;
        Ok(serde_json::json!({
            "response": response.response,
            "progress": response.progress,
            "can_finalize": response.can_finalize,
        }))
    }

    async fn finalize_conversation(&self, args: Value) -> Result<Value, ToolError> {
        let args: FinalizeConversationArgs = parse("finalize_conversation", args)?;
        let id = SessionId::new(args.session_id);
        let result: AnalysisResult = self.sessions.finalize(&id, args.format).await?;
        Ok(serde_json::to_value(result).expect("AnalysisResult always serializes"))
    }

    async fn get_conversation_status(&self, args: Value) -> Result<Value, ToolError> {
        let args: SessionIdArgs = parse("get_conversation_status", args)?;
        let id = SessionId::new(args.session_id);
        let status: StatusResponse = self.sessions.status(&id).await?;
        Ok(serde_json::json!({
            "state": status.state,
            "turn_count": status.turn_count,
            "tokens_used": status.tokens_used,
            "last_activity_at": status.last_activity_at,
            "can_finalize": status.can_finalize,
        }))
    }

    async fn run_hypothesis_tournament(&self, args: Value) -> Result<Value, ToolError> {
        let args: TournamentArgs = parse("run_hypothesis_tournament", args)?;
        validate_context(&args.context, &self.workspace_root)?;
        validate_text_len("issue", &args.issue, MAX_HYPOTHESIS_CHARS)?;
        let config = args.config.unwrap_or_default();
        let tournament = self.tournaments.run(args.context, args.issue, config).await?;
        Ok(serde_json::to_value(tournament).expect("Tournament always serializes"))
    }

    async fn health_check(&self, args: Value) -> Result<Value, ToolError> {
        let args: HealthCheckArgs = parse("health_check", args)?;
        match self.health.run_one(&args.name).await {
            Some(result) => Ok(serde_json::to_value(result).expect("NamedCheckResult always serializes")),
            None => Err(invalid("name", format!("unknown check: {}", args.name))),
        }
    }

    async fn health_summary(&self) -> Result<Value, ToolError> {
        let summary: HealthSummary = self.health.run_all().await;
        Ok(serde_json::to_value(summary).expect("HealthSummary always serializes"))
    }

    async fn get_model_info(&self) -> Result<Value, ToolError> {
        let infos: Vec<ModelInfo> = self.models.info().await;
        Ok(serde_json::to_value(infos).expect("ModelInfo always serializes"))
    }

    async fn set_model(&self, args: Value) -> Result<Value, ToolError> {
        let args: SetModelArgs = parse("set_model", args)?;
        if !self.models.set_preferred(&args.name).await {
            return Err(ToolError::UnknownModel(args.name));
        }
        Ok(serde_json::json!({ "active": args.name }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reasoning_arbiter::ArbiterConfig;
    use reasoning_core::model::{
        EnrichedContext, Findings, Focus, Recommendations, ResultMetadata, ResultStatus,
    };
    use reasoning_provider::{Provider, ProviderError, RateLimit};
    use reasoning_session::SessionStore;
    use serde_json::json;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
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
            Ok(AnalysisResult {
                status: ResultStatus::Success,
                findings: Findings::default(),
                recommendations: Recommendations::default(),
                enriched_context: EnrichedContext::default(),
                metadata: ResultMetadata {
                    provider: "fixed".to_string(),
                    ..ResultMetadata::default()
                },
            })
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let provider = Arc::new(FixedProvider);
        let arbiter = Arc::new(ProviderArbiter::new(
            vec![provider.clone()],
            None,
            ArbiterConfig::default(),
        ));
        let store = Arc::new(SessionStore::default());
        let sessions = SessionManager::new(store, Arc::clone(&arbiter));
        let tournaments = TournamentEngine::new(Arc::clone(&arbiter), sessions.clone());
        let health = Arc::new(HealthRegistry::new());
        let models = ModelRegistry::new(vec![provider]);
        ToolDispatcher::new(arbiter, sessions, tournaments, health, models, PathBuf::from("."))
    }

    fn ctx_json() -> Value {
        json!({
            "context": {
                "attempted_approaches": [],
                "partial_findings": [],
                "stuck_points": [],
                "focus": { "files": ["src/lib.rs"] },
            }
        })
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let dispatcher = dispatcher();
        let err = dispatcher.dispatch("no_such_tool", json!({})).await.unwrap_err();
        assert_eq!(err.category(), "unknown-tool");
    }

    #[tokio::test]
    async fn escalate_analysis_rejects_an_absolute_path() {
        let dispatcher = dispatcher();
        let args = json!({
            "context": {
                "focus": { "files": ["/etc/passwd"] },
            }
        });
        let err = dispatcher.dispatch("escalate_analysis", args).await.unwrap_err();
        assert_eq!(err.category(), "invalid-arguments");
    }

    #[tokio::test]
    async fn escalate_analysis_succeeds_on_a_valid_context() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("escalate_analysis", ctx_json()).await.unwrap();
        assert_eq!(result["status"], "success");
    }

    #[tokio::test]
    async fn full_conversation_round_trip() {
        let dispatcher = dispatcher();
        let args = json!({
            "analysis_type": "general",
            "context": {
                "focus": { "files": ["src/lib.rs"] },
            }
        });
        let started = dispatcher.dispatch("start_conversation", args).await.unwrap();
        let session_id = started["session_id"].as_str().unwrap().to_string();

        let status = dispatcher
            .dispatch("get_conversation_status", json!({ "session_id": session_id }))
            .await
            .unwrap();
        assert_eq!(status["turn_count"], 2);

        let finalized = dispatcher
            .dispatch(
                "finalize_conversation",
                json!({ "session_id": session_id, "format": "concise" }),
            )
            .await
            .unwrap();
        assert_eq!(finalized["status"], "success");
    }

    #[tokio::test]
    async fn set_model_rejects_unknown_names() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .dispatch("set_model", json!({ "name": "ghost" }))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "invalid-arguments");
    }

    #[tokio::test]
    async fn set_model_accepts_a_known_provider() {
        let dispatcher = dispatcher();
        let result = dispatcher
            .dispatch("set_model", json!({ "name": "fixed" }))
            .await
            .unwrap();
        assert_eq!(result["active"], "fixed");
    }

    #[tokio::test]
    async fn health_summary_is_healthy_with_no_checks_registered() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch("health_summary", json!({})).await.unwrap();
        assert_eq!(result["status"], "healthy");
    }
}

//! [`SessionManager`] (spec §4.6): owns the session state machine,
//! enforces at-most-one-writer per session, sequences turns, and invokes
//! the `ProviderArbiter` for each turn.

use crate::error::SessionError;
use crate::store::SessionStore;
use reasoning_arbiter::ProviderArbiter;
use reasoning_core::id::SessionId;
use reasoning_core::model::{
    AnalysisContext, AnalysisResult, AnalysisType, Session, SessionState, Turn, TurnRole,
};
use std::sync::Arc;

/// Default turn-count cap after which `continue` reports `canFinalize`.
pub const DEFAULT_MAX_SESSION_TURNS: usize = 10;

/// Requested summary style for `finalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeFormat {
    /// A thorough writeup.
    Detailed,
    /// A short writeup.
    Concise,
    /// An action-oriented writeup.
    Actionable,
}

impl FinalizeFormat {
    fn directive(&self) -> &'static str {
        match self {
            FinalizeFormat::Detailed => "Summarize using format: detailed",
            FinalizeFormat::Concise => "Summarize using format: concise",
            FinalizeFormat::Actionable => "Summarize using format: actionable",
        }
    }
}

/// Response to `SessionManager::start`.
#[derive(Debug, Clone)]
pub struct StartResponse {
    /// The newly created session's id.
    pub session_id: SessionId,
    /// The provider's first-turn response.
    pub initial_response: AnalysisResult,
    /// Next steps carried from the response, surfaced for the client.
    pub suggested_follow_ups: Vec<String>,
}

/// Response to `SessionManager::continue_turn`.
#[derive(Debug, Clone)]
pub struct ContinueResponse {
    /// The provider's response to this turn.
    pub response: AnalysisResult,
    /// Turns completed so far, out of the configured cap.
    pub progress: f64,
    /// Whether the session may now be finalized.
    pub can_finalize: bool,
}

/// Response to `SessionManager::status`.
#[derive(Debug, Clone)]
pub struct StatusResponse {
    /// Current lifecycle state.
    pub state: SessionState,
    /// Number of turns recorded so far.
    pub turn_count: usize,
    /// Total tokens used across all turns.
    pub tokens_used: u64,
    /// When the session last had activity.
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    /// Whether the session may now be finalized.
    pub can_finalize: bool,
}

fn can_finalize_from(turns: &[Turn], last_result: Option<&AnalysisResult>, max_turns: usize) -> bool {
    if turns.len() / 2 >= max_turns {
        return true;
    }
    matches!(
        last_result.map(|r| r.status),
        Some(reasoning_core::model::ResultStatus::Success)
    )
}

/// Owns the session state machine (spec §4.6's state diagram): `active ->
/// processing -> active` on each turn, `active -> finalizing -> finalized
/// -> (removed)` on finalize, `active -> expired -> (removed)` on TTL sweep.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<SessionStore>,
    arbiter: Arc<ProviderArbiter>,
    max_turns: usize,
}

impl SessionManager {
    /// Build a manager over a shared store and arbiter.
    pub fn new(store: Arc<SessionStore>, arbiter: Arc<ProviderArbiter>) -> Self {
        Self {
            store,
            arbiter,
            max_turns: DEFAULT_MAX_SESSION_TURNS,
        }
    }

    /// Override the turn cap used by `canFinalize`. Exposed mainly for tests.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Start a new session: creates it in `active`, records the client's
    /// opening question as the first turn, invokes the arbiter once, and
    /// stores the provider's initial turn.
    pub async fn start(
        &self,
        analysis_type: AnalysisType,
        context: AnalysisContext,
        initial_question: Option<String>,
    ) -> Result<StartResponse, SessionError> {
        let id = SessionId::new(uuid_like());
        let mut session = Session::new(id.clone(), analysis_type, context.clone());
        session.writer_held = true;
        session.state = SessionState::Processing;
        session.turns.push(Turn {
            role: TurnRole::Client,
            message: initial_question.unwrap_or_else(|| default_opening_question(&context)),
            timestamp: chrono::Utc::now(),
            tokens_used: None,
        });

        self.store
            .insert(session)
            .await
            .map_err(SessionError::LimitExceeded)?;

        let outcome = self.arbiter.analyze(&context, analysis_type, None).await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                // Roll back: the session never produced a usable first turn,
                // so don't let it sit on a `maxSessions` slot forever.
                self.store.remove(&id).await;
                return Err(SessionError::AllProvidersFailed(e.to_string()));
            }
        };

        let follow_ups = result.recommendations.investigation_next_steps.clone();

        self.store
            .with_mut(&id, |s| {
                s.turns.push(Turn {
                    role: TurnRole::Provider,
                    message: serialize_result_summary(&result),
                    timestamp: chrono::Utc::now(),
                    tokens_used: result.metadata.tokens_used,
                });
                s.last_activity_at = chrono::Utc::now();
                s.writer_held = false;
                s.state = SessionState::Active;
            })
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        Ok(StartResponse {
            session_id: id,
            initial_response: result,
            suggested_follow_ups: follow_ups,
        })
    }

    /// Append a client turn, invoke the arbiter with the accumulated
    /// conversation, append the provider's response.
    pub async fn continue_turn(&self, id: &SessionId, message: String) -> Result<ContinueResponse, SessionError> {
        let claim = self
            .store
            .with_mut(id, |s| {
                if s.writer_held {
                    return Err(SessionError::Busy(id.to_string()));
                }
                s.writer_held = true;
                s.state = SessionState::Processing;
                s.turns.push(Turn {
                    role: TurnRole::Client,
                    message: message.clone(),
                    timestamp: chrono::Utc::now(),
                    tokens_used: None,
                });
                s.last_activity_at = chrono::Utc::now();
                Ok(s.analysis_context.clone())
            })
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let context = match claim {
            Ok(context) => context,
            Err(e) => return Err(e),
        };

        let mut turn_context = context.clone();
        turn_context.attempted_approaches.push(message);

        let analysis_type = self
            .store
            .get(id)
            .await
            .map(|s| s.analysis_type)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let outcome = self.arbiter.analyze(&turn_context, analysis_type, None).await;

        match outcome {
            Ok(result) => {
                let (progress, can_finalize) = self
                    .store
                    .with_mut(id, |s| {
                        s.turns.push(Turn {
                            role: TurnRole::Provider,
                            message: serialize_result_summary(&result),
                            timestamp: chrono::Utc::now(),
                            tokens_used: result.metadata.tokens_used,
                        });
                        s.last_activity_at = chrono::Utc::now();
                        s.writer_held = false;
                        s.state = SessionState::Active;
                        let can_finalize = can_finalize_from(&s.turns, Some(&result), self.max_turns);
                        let progress = (s.turns.len() as f64 / 2.0) / self.max_turns as f64;
                        (progress.min(1.0), can_finalize)
                    })
                    .await
                    .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

                Ok(ContinueResponse {
                    response: result,
                    progress,
                    can_finalize,
                })
            }
            Err(e) => {
                // Roll back: release the writer lock without recording a
                // provider turn for a failed attempt.
                self.store
                    .with_mut(id, |s| {
                        s.writer_held = false;
                        s.state = SessionState::Active;
                    })
                    .await;
                Err(SessionError::AllProvidersFailed(e.to_string()))
            }
        }
    }

    /// Invoke the arbiter with a summary instruction, store the result,
    /// transition to `finalized`, and remove the session from the store.
    pub async fn finalize(&self, id: &SessionId, format: FinalizeFormat) -> Result<AnalysisResult, SessionError> {
        let claim = self
            .store
            .with_mut(id, |s| {
                if s.writer_held {
                    return Err(SessionError::Busy(id.to_string()));
                }
                s.writer_held = true;
                s.state = SessionState::Finalizing;
                Ok((s.analysis_context.clone(), s.analysis_type))
            })
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let (context, analysis_type) = match claim {
            Ok(v) => v,
            Err(e) => return Err(e),
        };

        let mut summary_context = context;
        summary_context.attempted_approaches.push(format.directive().to_string());

        let outcome = self.arbiter.analyze(&summary_context, analysis_type, None).await;

        match outcome {
            Ok(result) => {
                self.store
                    .with_mut(id, |s| {
                        s.state = SessionState::Finalized;
                        s.result = Some(result.clone());
                    })
                    .await;
                self.store.remove(id).await;
                Ok(result)
            }
            Err(e) => {
                self.store
                    .with_mut(id, |s| {
                        s.writer_held = false;
                        s.state = SessionState::Active;
                    })
                    .await;
                Err(SessionError::AllProvidersFailed(e.to_string()))
            }
        }
    }

    /// Inspect a session without mutating it.
    pub async fn status(&self, id: &SessionId) -> Result<StatusResponse, SessionError> {
        let session = self
            .store
            .get(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let tokens_used = session.turns.iter().filter_map(|t| t.tokens_used).sum();
        let can_finalize = can_finalize_from(&session.turns, session.result.as_ref(), self.max_turns);

        Ok(StatusResponse {
            state: session.state,
            turn_count: session.turns.len(),
            tokens_used,
            last_activity_at: session.last_activity_at,
            can_finalize,
        })
    }
}

/// A short human-readable summary of a result, used as a turn's message
/// body (the full structured result is still returned to the caller).
fn serialize_result_summary(result: &AnalysisResult) -> String {
    format!(
        "status={:?} root_causes={} actions={}",
        result.status,
        result.findings.root_causes.len(),
        result.recommendations.immediate_actions.len()
    )
}

/// Derive a reasonable opening question when the caller supplies none,
/// from the stuck points already present in the context.
fn default_opening_question(context: &AnalysisContext) -> String {
    if context.stuck_points.is_empty() {
        "Begin analysis.".to_string()
    } else {
        context.stuck_points.join("; ")
    }
}

/// A process-local, dependency-free unique suffix. Not a cryptographic or
/// globally-unique id — session ids only need to be unique within this
/// process's `SessionStore`.
fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sess-{}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0), n)
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

    struct FixedProvider {
        status: ResultStatus,
    }

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
                status: self.status,
                findings: Findings::default(),
                recommendations: Recommendations {
                    investigation_next_steps: vec!["check logs".to_string()],
                    ..Default::default()
                },
                enriched_context: EnrichedContext::default(),
                metadata: ResultMetadata {
                    provider: "fixed".to_string(),
                    ..ResultMetadata::default()
                },
            })
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

    fn manager(status: ResultStatus) -> SessionManager {
        let store = Arc::new(SessionStore::default());
        let arbiter = Arc::new(ProviderArbiter::new(
            vec![Arc::new(FixedProvider { status })],
            None,
            ArbiterConfig::default(),
        ));
        SessionManager::new(store, arbiter)
    }

    #[tokio::test]
    async fn start_creates_session_and_records_initial_turn() {
        let mgr = manager(ResultStatus::Partial);
        let resp = mgr.start(AnalysisType::General, ctx(), None).await.unwrap();
        assert_eq!(resp.suggested_follow_ups, vec!["check logs".to_string()]);

        let status = mgr.status(&resp.session_id).await.unwrap();
        assert_eq!(status.turn_count, 2);
        assert_eq!(status.state, SessionState::Active);
    }

    #[tokio::test]
    async fn continue_appends_client_and_provider_turns() {
        let mgr = manager(ResultStatus::Partial);
        let resp = mgr.start(AnalysisType::General, ctx(), None).await.unwrap();
        mgr.continue_turn(&resp.session_id, "more detail".to_string())
            .await
            .unwrap();
        let status = mgr.status(&resp.session_id).await.unwrap();
        assert_eq!(status.turn_count, 4);
    }

    #[tokio::test]
    async fn can_finalize_true_when_provider_reports_success() {
        let mgr = manager(ResultStatus::Success);
        let resp = mgr.start(AnalysisType::General, ctx(), None).await.unwrap();
        let cont = mgr
            .continue_turn(&resp.session_id, "more detail".to_string())
            .await
            .unwrap();
        assert!(cont.can_finalize);
    }

    #[tokio::test]
    async fn can_finalize_true_at_turn_cap_even_without_success() {
        let store = Arc::new(SessionStore::default());
        let arbiter = Arc::new(ProviderArbiter::new(
            vec![Arc::new(FixedProvider {
                status: ResultStatus::Partial,
            })],
            None,
            ArbiterConfig::default(),
        ));
        let mgr = SessionManager::new(store, arbiter).with_max_turns(1);
        let resp = mgr.start(AnalysisType::General, ctx(), None).await.unwrap();
        let cont = mgr
            .continue_turn(&resp.session_id, "more detail".to_string())
            .await
            .unwrap();
        assert!(cont.can_finalize);
    }

    #[tokio::test]
    async fn finalize_removes_session() {
        let mgr = manager(ResultStatus::Success);
        let resp = mgr.start(AnalysisType::General, ctx(), None).await.unwrap();
        mgr.finalize(&resp.session_id, FinalizeFormat::Concise).await.unwrap();
        let err = mgr.status(&resp.session_id).await.unwrap_err();
        assert_eq!(err.category(), "session-not-found");
    }

    #[tokio::test]
    async fn continue_on_unknown_session_is_not_found() {
        let mgr = manager(ResultStatus::Success);
        let err = mgr
            .continue_turn(&SessionId::new("missing"), "hi".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "session-not-found");
    }
}

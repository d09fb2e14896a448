//! The shared data model (spec §3): `AnalysisContext`, `AnalysisResult`,
//! `Session`, `Hypothesis`, `Tournament`, `ProviderStats`, `CacheEntry`.

use crate::id::{HypothesisId, SessionId, TournamentId};
use crate::location::CodeLocation;
use serde::{Deserialize, Serialize};

/// Which kind of analysis a request is asking for. Selects the
/// `PromptAssembler` instruction block and, for sessions, the turn's
/// running frame of reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// Execution tracing through a call path.
    ExecutionTrace,
    /// Cross-system / cross-service impact analysis.
    CrossSystem,
    /// Performance bottleneck hunting.
    Performance,
    /// Single hypothesis confirm/refute.
    HypothesisTest,
    /// General, unstructured escalation.
    General,
}

impl AnalysisType {
    /// Stable lowercase name, used as part of the cache fingerprint and
    /// in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::ExecutionTrace => "execution_trace",
            AnalysisType::CrossSystem => "cross_system",
            AnalysisType::Performance => "performance",
            AnalysisType::HypothesisTest => "hypothesis_test",
            AnalysisType::General => "general",
        }
    }
}

/// One entry point the client has identified as relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    /// File containing the entry point.
    pub file: String,
    /// Line of the entry point.
    pub line: u32,
    /// Optional column.
    pub column: Option<u32>,
    /// Optional enclosing function name.
    pub function_name: Option<String>,
}

/// The focus of an analysis request: which files, entry points, and
/// services the client believes are relevant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Focus {
    /// Candidate files. Must be non-empty after validation (spec §3 invariant).
    pub files: Vec<String>,
    /// Optional named entry points within those files.
    #[serde(default)]
    pub entry_points: Option<Vec<EntryPoint>>,
    /// Optional service names implicated by the issue.
    #[serde(default)]
    pub service_names: Option<Vec<String>>,
}

/// A finding the client already has, supplied as partial context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialFinding {
    /// Rough category of the finding.
    pub kind: String,
    /// Severity as reported by the client.
    pub severity: String,
    /// Where the finding was observed.
    pub location: CodeLocation,
    /// Free-text description.
    pub description: String,
    /// Supporting evidence strings.
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// The untrusted input envelope from the client (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// What the client already tried, in order.
    #[serde(default)]
    pub attempted_approaches: Vec<String>,
    /// Findings the client has already collected.
    #[serde(default)]
    pub partial_findings: Vec<PartialFinding>,
    /// Points where the client got stuck.
    #[serde(default)]
    pub stuck_points: Vec<String>,
    /// Files, entry points, and services in scope.
    pub focus: Focus,
    /// Remaining time budget, if the client is tracking one.
    #[serde(default)]
    pub budget_remaining_seconds: Option<u64>,
}

impl AnalysisContext {
    /// Whether `focus.files` is non-empty, per the §3 invariant.
    pub fn has_focus_files(&self) -> bool {
        !self.focus.files.is_empty()
    }
}

/// Overall disposition of an `AnalysisResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultStatus {
    /// The provider returned a complete, well-formed analysis.
    Success,
    /// The provider's output could only be partially understood.
    Partial,
    /// The provider judged that more context is required.
    NeedMoreContext,
}

/// A candidate root cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCause {
    /// Category of the root cause.
    pub kind: String,
    /// Description of the root cause.
    pub description: String,
    /// Supporting evidence locations.
    #[serde(default)]
    pub evidence: Vec<CodeLocation>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Suggested strategy for fixing it.
    pub fix_strategy: String,
}

/// A single step within an execution path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Where this step occurs.
    pub location: CodeLocation,
    /// What operation this step performs.
    pub operation: String,
    /// Inputs observed or inferred at this step.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Outputs observed or inferred at this step.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// State changes caused by this step.
    #[serde(default)]
    pub state_changes: Vec<String>,
}

/// Complexity characterization for an execution path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComplexityInfo {
    /// Time complexity, e.g. "O(n^2)".
    #[serde(default)]
    pub time: Option<String>,
    /// Space complexity, e.g. "O(n)".
    #[serde(default)]
    pub space: Option<String>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// One traced execution path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPath {
    /// Identifier for this path, stable within a single result.
    pub id: String,
    /// Ordered steps through the path.
    pub steps: Vec<ExecutionStep>,
    /// Complexity characterization.
    #[serde(default)]
    pub complexity: ComplexityInfo,
}

/// Kind of performance bottleneck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BottleneckKind {
    /// Classic N+1 query pattern.
    NPlusOne,
    /// An asymptotically inefficient algorithm.
    InefficientAlgorithm,
    /// Excessive I/O operations.
    ExcessiveIo,
    /// A memory leak.
    MemoryLeak,
}

/// Estimated impact of a bottleneck.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BottleneckImpact {
    /// Estimated latency contribution, free text (e.g. "+150ms p95").
    #[serde(default)]
    pub estimated_latency: Option<String>,
    /// Operations affected.
    #[serde(default)]
    pub affected_operations: Vec<String>,
    /// How often the bottleneck is hit, free text.
    #[serde(default)]
    pub frequency: Option<String>,
}

/// A single performance bottleneck finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceBottleneck {
    /// Kind of bottleneck.
    pub kind: BottleneckKind,
    /// Where it occurs.
    pub location: CodeLocation,
    /// Estimated impact.
    #[serde(default)]
    pub impact: BottleneckImpact,
    /// Suggested remediation.
    pub suggestion: String,
}

/// Kind of cross-system impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactKind {
    /// A breaking change to a downstream consumer.
    Breaking,
    /// A performance regression for a downstream consumer.
    Performance,
    /// A behavioral change that may not break callers but changes semantics.
    Behavioral,
}

/// A single cross-system impact finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSystemImpact {
    /// The affected service.
    pub service: String,
    /// Kind of impact.
    pub impact_kind: ImpactKind,
    /// Endpoints affected.
    #[serde(default)]
    pub affected_endpoints: Vec<String>,
    /// Downstream effects, free text.
    #[serde(default)]
    pub downstream_effects: Vec<String>,
}

/// Priority of a recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

/// Kind of recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Apply a fix directly.
    Fix,
    /// Investigate further before acting.
    Investigate,
    /// Refactor the implicated code.
    Refactor,
    /// Add monitoring/observability.
    Monitor,
}

/// A recommended immediate action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmediateAction {
    /// Kind of action.
    pub kind: ActionKind,
    /// Description of the action.
    pub description: String,
    /// Priority.
    pub priority: Priority,
    /// Estimated effort, free text (e.g. "30m", "1 day").
    pub estimated_effort: String,
}

/// Kind of code change required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// A new file must be created.
    Create,
    /// An existing file must be modified.
    Modify,
    /// A file must be deleted.
    Delete,
}

/// A single code change recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChange {
    /// File to change.
    pub file: String,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Description of the change.
    pub description: String,
    /// Optional suggested code.
    #[serde(default)]
    pub suggested_code: Option<String>,
}

/// The `findings` block of an `AnalysisResult`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Findings {
    /// Candidate root causes.
    #[serde(default)]
    pub root_causes: Vec<RootCause>,
    /// Traced execution paths.
    #[serde(default)]
    pub execution_paths: Vec<ExecutionPath>,
    /// Performance bottlenecks.
    #[serde(default)]
    pub performance_bottlenecks: Vec<PerformanceBottleneck>,
    /// Cross-system impacts.
    #[serde(default)]
    pub cross_system_impacts: Vec<CrossSystemImpact>,
}

/// The `recommendations` block of an `AnalysisResult`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Recommendations {
    /// Actions to take immediately.
    #[serde(default)]
    pub immediate_actions: Vec<ImmediateAction>,
    /// Suggested next investigation steps.
    #[serde(default)]
    pub investigation_next_steps: Vec<String>,
    /// Code changes needed.
    #[serde(default)]
    pub code_changes_needed: Vec<CodeChange>,
}

/// The `enrichedContext` block of an `AnalysisResult`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnrichedContext {
    /// New insights surfaced by this analysis.
    #[serde(default)]
    pub new_insights: Vec<String>,
    /// Hypotheses this analysis validated.
    #[serde(default)]
    pub validated_hypotheses: Vec<String>,
    /// Approaches this analysis ruled out (seeded from
    /// `AnalysisContext.attemptedApproaches`, per spec §4.2).
    #[serde(default)]
    pub ruled_out_approaches: Vec<String>,
}

/// The `metadata` block of an `AnalysisResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Wall-clock duration of the analysis.
    pub duration_ms: u64,
    /// Name of the provider that produced the result.
    pub provider: String,
    /// Estimated cost in USD, if known.
    #[serde(default)]
    pub cost: Option<f64>,
    /// Tokens used, if known.
    #[serde(default)]
    pub tokens_used: Option<u64>,
    /// Whether the arbiter fell back from a higher-priority provider.
    #[serde(default)]
    pub fallback_used: bool,
    /// Whether this result was served from `ReasoningCache`.
    #[serde(default)]
    pub from_cache: bool,
}

impl Default for ResultMetadata {
    fn default() -> Self {
        Self {
            duration_ms: 0,
            provider: String::new(),
            cost: None,
            tokens_used: None,
            fallback_used: false,
            from_cache: false,
        }
    }
}

/// The typed output of an analysis (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Overall disposition.
    pub status: ResultStatus,
    /// Structured findings.
    #[serde(default)]
    pub findings: Findings,
    /// Recommended next actions.
    #[serde(default)]
    pub recommendations: Recommendations,
    /// Context enrichment carried forward.
    #[serde(default)]
    pub enriched_context: EnrichedContext,
    /// Execution metadata.
    pub metadata: ResultMetadata,
}

impl AnalysisResult {
    /// Clamp every confidence value into `[0, 1]`, per the §3 invariant.
    pub fn clamp_confidences(&mut self) {
        for rc in &mut self.findings.root_causes {
            rc.confidence = rc.confidence.clamp(0.0, 1.0);
        }
    }
}

// ---------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------

/// Who produced a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The client (IDE-embedded assistant).
    Client,
    /// The LLM provider.
    Provider,
}

/// A single turn within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn.
    pub role: TurnRole,
    /// The turn's message content.
    pub message: String,
    /// When the turn was recorded.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Tokens used to produce this turn, if known.
    #[serde(default)]
    pub tokens_used: Option<u64>,
}

/// Lifecycle state of a `Session` (spec §4.6 state diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Idle, ready to accept `continue` or `finalize`.
    Active,
    /// A turn is being processed.
    Processing,
    /// A `finalize` call is in flight.
    Finalizing,
    /// Finalized; about to be removed from the store.
    Finalized,
    /// Expired by the TTL sweep; about to be removed.
    Expired,
}

/// A conversational unit (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, unique session id.
    pub id: SessionId,
    /// The analysis type this session was started with.
    pub analysis_type: AnalysisType,
    /// When the session was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When the session last had activity.
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Ordered turns, alternating starting with `client`.
    pub turns: Vec<Turn>,
    /// The context captured at `start`.
    pub analysis_context: AnalysisContext,
    /// Whether a writer currently holds the single-writer lock.
    pub writer_held: bool,
    /// Populated only once `state == Finalized`.
    pub result: Option<AnalysisResult>,
}

impl Session {
    /// Construct a freshly-started session with no turns yet.
    pub fn new(id: SessionId, analysis_type: AnalysisType, analysis_context: AnalysisContext) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            analysis_type,
            created_at: now,
            last_activity_at: now,
            state: SessionState::Active,
            turns: Vec::new(),
            analysis_context,
            writer_held: false,
            result: None,
        }
    }

    /// Whether the turn sequence alternates starting with `client`
    /// (the §3 invariant).
    pub fn turns_well_ordered(&self) -> bool {
        self.turns
            .iter()
            .enumerate()
            .all(|(i, t)| {
                let expected = if i % 2 == 0 {
                    TurnRole::Client
                } else {
                    TurnRole::Provider
                };
                t.role == expected
            })
    }
}

// ---------------------------------------------------------------------
// Tournament / Hypothesis
// ---------------------------------------------------------------------

/// A single falsifiable hypothesis under test within a tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    /// Unique id within the owning tournament.
    pub id: HypothesisId,
    /// The hypothesis statement.
    pub statement: String,
    /// Confidence the provider assigned at generation time.
    pub initial_confidence: f64,
    /// The session backing this hypothesis's evidence-gathering, if spawned.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Evidence for the hypothesis, each entry a (text, quality in [0,1]) pair.
    #[serde(default)]
    pub evidence_for: Vec<(String, f64)>,
    /// Evidence against the hypothesis.
    #[serde(default)]
    pub evidence_against: Vec<(String, f64)>,
    /// Current score, recomputed purely from evidence (§3 invariant).
    pub score: f64,
    /// The round in which this hypothesis was eliminated, if any.
    #[serde(default)]
    pub eliminated_in_round: Option<u32>,
}

impl Hypothesis {
    /// Recompute `score` from accumulated evidence cardinality and quality.
    ///
    /// `score = initial_confidence + sum(quality_for) - sum(quality_against)`,
    /// clamped to `[0, 1]`. Pure function of `evidence_for`/`evidence_against`,
    /// satisfying the §3 invariant.
    pub fn recompute_score(&mut self) {
        let for_sum: f64 = self.evidence_for.iter().map(|(_, q)| q).sum();
        let against_sum: f64 = self.evidence_against.iter().map(|(_, q)| q).sum();
        self.score = (self.initial_confidence + for_sum - against_sum).clamp(0.0, 1.0);
    }
}

/// Lifecycle state of a `Tournament`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentState {
    /// Generating the initial hypothesis set.
    Generating,
    /// Running evidence-gathering rounds.
    Running,
    /// Completed with a winner.
    Complete,
    /// Failed (e.g. insufficient hypotheses).
    Failed,
}

/// Bounds on a tournament's shape (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Number of hypotheses to generate, in `[2, 20]`.
    pub max_hypotheses: u32,
    /// Number of rounds to run, in `[1, 5]`.
    pub max_rounds: u32,
    /// Number of per-hypothesis sessions to run concurrently, in `[1, 10]`.
    pub parallel_sessions: u32,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            max_hypotheses: 4,
            max_rounds: 2,
            parallel_sessions: 2,
        }
    }
}

impl TournamentConfig {
    /// Clamp every field into its documented range.
    pub fn normalized(mut self) -> Self {
        self.max_hypotheses = self.max_hypotheses.clamp(2, 20);
        self.max_rounds = self.max_rounds.clamp(1, 5);
        self.parallel_sessions = self.parallel_sessions.clamp(1, 10);
        self
    }
}

/// A bracketed competitive evaluation of parallel hypotheses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    /// Unique id.
    pub id: TournamentId,
    /// The analysis context shared by all hypotheses.
    pub context: AnalysisContext,
    /// The issue under investigation.
    pub issue: String,
    /// Bracket configuration.
    pub config: TournamentConfig,
    /// All hypotheses, including eliminated ones.
    pub hypotheses: Vec<Hypothesis>,
    /// Number of rounds actually run so far.
    pub rounds_run: u32,
    /// The winning hypothesis id, once complete.
    #[serde(default)]
    pub winner: Option<HypothesisId>,
    /// Current lifecycle state.
    pub state: TournamentState,
}

// ---------------------------------------------------------------------
// Provider stats / circuit breaker
// ---------------------------------------------------------------------

/// Per-provider circuit breaker state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitState {
    /// Whether the circuit is currently open (calls skipped).
    pub open: bool,
    /// Consecutive classified-retryable failures observed.
    pub consecutive_failures: u32,
    /// When an open circuit may be retried.
    #[serde(default)]
    pub reset_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            open: false,
            consecutive_failures: 0,
            reset_at: None,
        }
    }
}

/// Per-provider call statistics (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderStats {
    /// Total calls attempted.
    pub calls: u64,
    /// Total calls that failed.
    pub failures: u64,
    /// Cumulative duration across all calls.
    pub total_duration_ms: u64,
    /// Circuit breaker state.
    pub circuit: CircuitState,
    /// Timestamp of the last successful call.
    #[serde(default)]
    pub last_success_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ---------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------

/// A cached prior `AnalysisResult`, keyed by fingerprint (spec §4.11).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached value.
    pub value: AnalysisResult,
    /// When the entry was inserted.
    pub created_at: std::time::Instant,
    /// Time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Approximate size in bytes, used for the memory cap.
    pub size_bytes: usize,
    /// Number of times `get` has returned this entry.
    pub access_count: u64,
    /// When this entry was last accessed via `get`.
    pub last_accessed_at: std::time::Instant,
}

impl CacheEntry {
    /// Whether this entry has outlived its TTL as of `now`.
    pub fn is_expired_at(&self, now: std::time::Instant) -> bool {
        now.saturating_duration_since(self.created_at).as_millis() as u64 > self.ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypothesis_score_recompute_is_pure_and_clamped() {
        let mut h = Hypothesis {
            id: HypothesisId::new("h1"),
            statement: "x causes y".into(),
            initial_confidence: 0.5,
            session_id: None,
            evidence_for: vec![("a".into(), 0.9), ("b".into(), 0.9)],
            evidence_against: vec![],
            score: 0.0,
            eliminated_in_round: None,
        };
        h.recompute_score();
        assert_eq!(h.score, 1.0); // clamped from 2.3
    }

    #[test]
    fn session_turns_well_ordered_detects_violation() {
        let mut s = Session::new(
            SessionId::new("s1"),
            AnalysisType::General,
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
            },
        );
        assert!(s.turns_well_ordered());
        s.turns.push(Turn {
            role: TurnRole::Provider,
            message: "oops".into(),
            timestamp: chrono::Utc::now(),
            tokens_used: None,
        });
        assert!(!s.turns_well_ordered());
    }

    #[test]
    fn tournament_config_clamps_into_documented_ranges() {
        let cfg = TournamentConfig {
            max_hypotheses: 100,
            max_rounds: 0,
            parallel_sessions: 50,
        }
        .normalized();
        assert_eq!(cfg.max_hypotheses, 20);
        assert_eq!(cfg.max_rounds, 1);
        assert_eq!(cfg.parallel_sessions, 10);
    }

    #[test]
    fn result_confidences_are_clamped() {
        let mut result = AnalysisResult {
            status: ResultStatus::Success,
            findings: Findings {
                root_causes: vec![RootCause {
                    kind: "bug".into(),
                    description: "d".into(),
                    evidence: vec![],
                    confidence: 1.5,
                    fix_strategy: "f".into(),
                }],
                ..Default::default()
            },
            recommendations: Recommendations::default(),
            enriched_context: EnrichedContext::default(),
            metadata: ResultMetadata::default(),
        };
        result.clamp_confidences();
        assert_eq!(result.findings.root_causes[0].confidence, 1.0);
    }
}

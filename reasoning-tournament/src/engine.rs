//! [`TournamentEngine`] (spec §4.7): generates a bracket of falsifiable
//! hypotheses, runs bounded-parallel evidence-gathering rounds backed by
//! [`SessionManager`], and eliminates the lowest-scoring half each round.

use reasoning_arbiter::ProviderArbiter;
use reasoning_core::id::{HypothesisId, TournamentId};
use reasoning_core::model::{
    AnalysisContext, AnalysisType, Hypothesis, Tournament, TournamentConfig, TournamentState,
};
use reasoning_session::SessionManager;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Failure modes specific to running a tournament.
#[derive(Debug, thiserror::Error)]
pub enum TournamentError {
    /// Hypothesis generation yielded fewer than two usable hypotheses.
    #[error("insufficient hypotheses generated: got {0}, need at least 2")]
    InsufficientHypotheses(usize),
}

/// Drives a [`Tournament`] from generation through elimination rounds.
pub struct TournamentEngine {
    arbiter: Arc<ProviderArbiter>,
    sessions: SessionManager,
}

impl TournamentEngine {
    /// Build an engine over a shared arbiter (used for hypothesis
    /// generation) and a session manager (used for per-hypothesis
    /// evidence-gathering rounds).
    pub fn new(arbiter: Arc<ProviderArbiter>, sessions: SessionManager) -> Self {
        Self { arbiter, sessions }
    }

    /// Run a full tournament: generate hypotheses, run elimination rounds,
    /// and return the completed (or failed) bracket.
    pub async fn run(
        &self,
        context: AnalysisContext,
        issue: String,
        config: TournamentConfig,
    ) -> Result<Tournament, TournamentError> {
        let config = config.normalized();
        let mut tournament = Tournament {
            id: TournamentId::new(generation_id()),
            context: context.clone(),
            issue: issue.clone(),
            config: config.clone(),
            hypotheses: Vec::new(),
            rounds_run: 0,
            winner: None,
            state: TournamentState::Generating,
        };

        let hypotheses = self.generate_hypotheses(&context, &issue, &config).await;
        if hypotheses.len() < 2 {
            tournament.state = TournamentState::Failed;
            return Err(TournamentError::InsufficientHypotheses(hypotheses.len()));
        }
        tournament.hypotheses = hypotheses;
        tournament.state = TournamentState::Running;

        let semaphore = Arc::new(Semaphore::new(config.parallel_sessions as usize));

        for round in 1..=config.max_rounds {
            let survivor_idxs: Vec<usize> = tournament
                .hypotheses
                .iter()
                .enumerate()
                .filter(|(_, h)| h.eliminated_in_round.is_none())
                .map(|(i, _)| i)
                .collect();

            if survivor_idxs.len() <= 1 {
                break;
            }

            tournament.rounds_run = round;

            let mut handles = Vec::with_capacity(survivor_idxs.len());
            for &idx in &survivor_idxs {
                let hypothesis = tournament.hypotheses[idx].clone();
                let sessions = self.sessions.clone();
                let context = context.clone();
                let issue = issue.clone();
                let semaphore = Arc::clone(&semaphore);
                handles.push((
                    idx,
                    tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                        gather_evidence(&sessions, &context, &issue, &hypothesis).await
                    }),
                ));
            }

            for (idx, handle) in handles {
                match handle.await {
                    Ok(Some((for_evidence, against_evidence))) => {
                        let h = &mut tournament.hypotheses[idx];
                        h.evidence_for.extend(for_evidence);
                        h.evidence_against.extend(against_evidence);
                        h.recompute_score();
                    }
                    Ok(None) => {
                        // Per-hypothesis session failure: neutral, no evidence added.
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "evidence-gathering task panicked");
                    }
                }
            }

            eliminate_lowest_half(&mut tournament.hypotheses, round);
        }

        let winner = pick_winner(&tournament.hypotheses);
        tournament.winner = winner;
        tournament.state = TournamentState::Complete;
        Ok(tournament)
    }

    async fn generate_hypotheses(
        &self,
        context: &AnalysisContext,
        issue: &str,
        config: &TournamentConfig,
    ) -> Vec<Hypothesis> {
        let mut generation_context = context.clone();
        generation_context.attempted_approaches.push(format!(
            "Generate exactly {} distinct, falsifiable hypotheses explaining: {}",
            config.max_hypotheses, issue
        ));

        let result = match self
            .arbiter
            .analyze(&generation_context, AnalysisType::General, None)
            .await
        {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };

        result
            .findings
            .root_causes
            .into_iter()
            .take(config.max_hypotheses as usize)
            .enumerate()
            .map(|(i, rc)| Hypothesis {
                id: HypothesisId::new(format!("h{}", i)),
                statement: rc.description,
                initial_confidence: rc.confidence,
                session_id: None,
                evidence_for: Vec::new(),
                evidence_against: Vec::new(),
                score: rc.confidence,
                eliminated_in_round: None,
            })
            .collect()
    }
}

/// Spawn a conversation seeking evidence for and against a single
/// hypothesis, returning `(evidence_for, evidence_against)` pairs, or
/// `None` if every provider failed (scored as neutral per spec).
async fn gather_evidence(
    sessions: &SessionManager,
    context: &AnalysisContext,
    issue: &str,
    hypothesis: &Hypothesis,
) -> Option<(Vec<(String, f64)>, Vec<(String, f64)>)> {
    let opening = format!(
        "Investigating: {}. Seek evidence for and against the hypothesis: {}",
        issue, hypothesis.statement
    );

    let start = sessions
        .start(AnalysisType::HypothesisTest, context.clone(), Some(opening))
        .await
        .ok()?;

    let finalize = sessions
        .finalize(&start.session_id, reasoning_session::FinalizeFormat::Concise)
        .await
        .ok()?;

    let for_evidence: Vec<(String, f64)> = finalize
        .findings
        .root_causes
        .iter()
        .map(|rc| (rc.description.clone(), rc.confidence))
        .collect();

    let against_evidence: Vec<(String, f64)> =
        if finalize.status == reasoning_core::model::ResultStatus::NeedMoreContext {
            vec![("provider could not confirm without more context".to_string(), 0.3)]
        } else {
            Vec::new()
        };

    Some((for_evidence, against_evidence))
}

/// Sort survivors by score descending and mark the lowest-scoring half
/// (rounded down, at least one survivor always remains) as eliminated in
/// this round.
fn eliminate_lowest_half(hypotheses: &mut [Hypothesis], round: u32) {
    let mut survivor_idxs: Vec<usize> = hypotheses
        .iter()
        .enumerate()
        .filter(|(_, h)| h.eliminated_in_round.is_none())
        .map(|(i, _)| i)
        .collect();

    survivor_idxs.sort_by(|&a, &b| {
        hypotheses[b]
            .score
            .partial_cmp(&hypotheses[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let eliminate_count = survivor_idxs.len() / 2;
    for &idx in survivor_idxs.iter().rev().take(eliminate_count) {
        hypotheses[idx].eliminated_in_round = Some(round);
    }
}

/// The highest-scoring survivor, ties broken by earliest-introduced
/// (lowest index) hypothesis.
fn pick_winner(hypotheses: &[Hypothesis]) -> Option<HypothesisId> {
    hypotheses
        .iter()
        .enumerate()
        .filter(|(_, h)| h.eliminated_in_round.is_none())
        .max_by(|(ia, a), (ib, b)| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ib.cmp(ia))
        })
        .map(|(_, h)| h.id.clone())
}

fn generation_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tourn-{}-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0), n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reasoning_arbiter::ArbiterConfig;
    use reasoning_core::model::{
        EnrichedContext, Findings, Focus, Recommendations, ResultMetadata, ResultStatus, RootCause,
    };
    use reasoning_provider::{Provider, ProviderError, RateLimit};
    use reasoning_session::SessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        call: AtomicUsize,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
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
            let n = self.call.fetch_add(1, Ordering::Relaxed);
            if n == 0 {
                // Generation call: four distinct candidate hypotheses.
                return Ok(AnalysisResult {
                    status: ResultStatus::Success,
                    findings: Findings {
                        root_causes: vec![
                            RootCause {
                                kind: "bug".into(),
                                description: "cache invalidation race".into(),
                                evidence: vec![],
                                confidence: 0.9,
                                fix_strategy: String::new(),
                            },
                            RootCause {
                                kind: "bug".into(),
                                description: "off-by-one in pagination".into(),
                                evidence: vec![],
                                confidence: 0.4,
                                fix_strategy: String::new(),
                            },
                            RootCause {
                                kind: "bug".into(),
                                description: "stale config read".into(),
                                evidence: vec![],
                                confidence: 0.6,
                                fix_strategy: String::new(),
                            },
                        ],
                        ..Default::default()
                    },
                    recommendations: Recommendations::default(),
                    enriched_context: EnrichedContext::default(),
                    metadata: ResultMetadata {
                        provider: "scripted".to_string(),
                        ..ResultMetadata::default()
                    },
                });
            }
            Ok(AnalysisResult {
                status: ResultStatus::Success,
                findings: Findings {
                    root_causes: vec![RootCause {
                        kind: "evidence".into(),
                        description: "log line confirms race".into(),
                        evidence: vec![],
                        confidence: 0.5,
                        fix_strategy: String::new(),
                    }],
                    ..Default::default()
                },
                recommendations: Recommendations::default(),
                enriched_context: EnrichedContext::default(),
                metadata: ResultMetadata {
                    provider: "scripted".to_string(),
                    ..ResultMetadata::default()
                },
            })
        }
    }

    use reasoning_core::model::AnalysisResult;

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

    fn engine() -> TournamentEngine {
        let provider = Arc::new(ScriptedProvider {
            call: AtomicUsize::new(0),
        });
        let arbiter = Arc::new(ProviderArbiter::new(
            vec![provider],
            None,
            ArbiterConfig::default(),
        ));
        let store = Arc::new(SessionStore::default());
        let sessions = SessionManager::new(store, Arc::clone(&arbiter));
        TournamentEngine::new(arbiter, sessions)
    }

    #[tokio::test]
    async fn runs_to_completion_with_a_winner() {
        let engine = engine();
        let config = TournamentConfig {
            max_hypotheses: 3,
            max_rounds: 2,
            parallel_sessions: 2,
        };
        let tournament = engine.run(ctx(), "requests intermittently time out".to_string(), config).await.unwrap();

        assert_eq!(tournament.state, TournamentState::Complete);
        assert_eq!(tournament.hypotheses.len(), 3);
        assert!(tournament.winner.is_some());
        let survivors = tournament
            .hypotheses
            .iter()
            .filter(|h| h.eliminated_in_round.is_none())
            .count();
        assert_eq!(survivors, 1);
    }

    #[tokio::test]
    async fn too_few_hypotheses_fails() {
        struct EmptyProvider;

        #[async_trait]
        impl Provider for EmptyProvider {
            fn name(&self) -> &str {
                "empty"
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
                        provider: "empty".to_string(),
                        ..ResultMetadata::default()
                    },
                })
            }
        }

        let arbiter = Arc::new(ProviderArbiter::new(
            vec![Arc::new(EmptyProvider)],
            None,
            ArbiterConfig::default(),
        ));
        let store = Arc::new(SessionStore::default());
        let sessions = SessionManager::new(store, Arc::clone(&arbiter));
        let engine = TournamentEngine::new(arbiter, sessions);

        let err = engine
            .run(ctx(), "issue".to_string(), TournamentConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::InsufficientHypotheses(0)));
    }

    #[test]
    fn eliminate_lowest_half_keeps_at_least_one() {
        let mut hs = vec![
            Hypothesis {
                id: HypothesisId::new("a"),
                statement: "a".into(),
                initial_confidence: 0.9,
                session_id: None,
                evidence_for: vec![],
                evidence_against: vec![],
                score: 0.9,
                eliminated_in_round: None,
            },
            Hypothesis {
                id: HypothesisId::new("b"),
                statement: "b".into(),
                initial_confidence: 0.1,
                session_id: None,
                evidence_for: vec![],
                evidence_against: vec![],
                score: 0.1,
                eliminated_in_round: None,
            },
        ];
        eliminate_lowest_half(&mut hs, 1);
        let survivors: Vec<_> = hs.iter().filter(|h| h.eliminated_in_round.is_none()).collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].id, HypothesisId::new("a"));
    }
}

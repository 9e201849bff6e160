//! Trial loop: research, merge, deliberate, until a verdict.
//!
//! Status transitions follow [`coordination::trial::TrialStatus`]. The
//! round limit is enforced twice: the arbiter forces acceptance on the
//! final round, and a loop that still exits without one composes a forced
//! verdict from the gathered evidence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use coordination::config::TrialConfig;
use coordination::trial::{
    compose_forced_verdict, Decision, MergeOutcome, PersistenceError, Side, TrialError,
    TrialState, TrialStatus, VerdictRecord,
};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::agents::{Arbiter, Evidence, ResearchAgent, ResearchFindings};
use crate::backend::GenerationBackend;
use crate::config::BackendConfig;
use crate::retriever::EvidenceRetriever;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of a finished trial.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub verdict: String,
    pub decision: Decision,
    /// Rounds actually run.
    pub rounds: u32,
    /// The round limit, not the arbiter, closed the trial.
    pub forced: bool,
    pub verdict_path: PathBuf,
}

/// Inputs one research agent needs for a round.
struct RoundInput {
    topic: String,
    feedback: String,
    previous: Vec<String>,
    suggested: Vec<String>,
}

impl RoundInput {
    fn capture(state: &TrialState, side: Side) -> Self {
        Self {
            topic: state.topic().to_string(),
            feedback: state.feedback(),
            previous: state.used_queries(side),
            suggested: state.suggested_queries(side),
        }
    }
}

fn failed_findings(side: Side) -> ResearchFindings {
    ResearchFindings {
        query: String::new(),
        origin: crate::agents::QueryOrigin::Fallback,
        evidence: Evidence::Missing(format!("Error gathering {side} evidence")),
    }
}

pub struct TrialOrchestrator {
    advocate: Arc<ResearchAgent>,
    skeptic: Arc<ResearchAgent>,
    arbiter: Arbiter,
    config: Arc<TrialConfig>,
}

impl TrialOrchestrator {
    /// Build all three roles over one backend and one retriever.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        retriever: EvidenceRetriever,
        config: Arc<TrialConfig>,
        backend_config: &BackendConfig,
    ) -> Self {
        let research = |side| {
            ResearchAgent::new(
                side,
                backend.clone(),
                retriever.clone(),
                &config,
                backend_config.research_temperature,
            )
        };
        let advocate = research(Side::Positive);
        let skeptic = research(Side::Negative);
        let arbiter = Arbiter::new(backend.clone(), config.clone(), backend_config.arbiter_temperature);
        Self::from_parts(advocate, skeptic, arbiter, config)
    }

    pub fn from_parts(
        advocate: ResearchAgent,
        skeptic: ResearchAgent,
        arbiter: Arbiter,
        config: Arc<TrialConfig>,
    ) -> Self {
        Self {
            advocate: Arc::new(advocate),
            skeptic: Arc::new(skeptic),
            arbiter,
            config,
        }
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    async fn run_agent(agent: Arc<ResearchAgent>, input: RoundInput) -> ResearchFindings {
        agent
            .research_round(&input.topic, &input.feedback, &input.previous, &input.suggested)
            .await
    }

    fn settle(side: Side, joined: Result<ResearchFindings, JoinError>) -> ResearchFindings {
        joined.unwrap_or_else(|e| {
            error!(%side, error = %e, "Research task failed");
            failed_findings(side)
        })
    }

    /// Run both research agents, concurrently when configured.
    ///
    /// Each agent runs in its own task in both modes, so a panicking agent
    /// yields placeholder findings instead of aborting the round.
    async fn research(&self, state: &TrialState) -> (ResearchFindings, ResearchFindings) {
        let pos_input = RoundInput::capture(state, Side::Positive);
        let neg_input = RoundInput::capture(state, Side::Negative);

        if !self.config.parallel_research {
            let pos = tokio::spawn(Self::run_agent(self.advocate.clone(), pos_input)).await;
            let pos = Self::settle(Side::Positive, pos);
            let neg = tokio::spawn(Self::run_agent(self.skeptic.clone(), neg_input)).await;
            let neg = Self::settle(Side::Negative, neg);
            return (pos, neg);
        }

        let pos_task = tokio::spawn(Self::run_agent(self.advocate.clone(), pos_input));
        let neg_task = tokio::spawn(Self::run_agent(self.skeptic.clone(), neg_input));
        let (pos, neg) = tokio::join!(pos_task, neg_task);
        (
            Self::settle(Side::Positive, pos),
            Self::settle(Side::Negative, neg),
        )
    }

    fn merge(state: &TrialState, side: Side, findings: &ResearchFindings) -> Result<(), TrialError> {
        state.record_query(side, &findings.query)?;
        match &findings.evidence {
            Evidence::Found(text) => match state.merge_evidence(side, text)? {
                MergeOutcome::Added => debug!(%side, chars = text.len(), "Evidence added"),
                duplicate => info!(%side, ?duplicate, "Duplicate evidence skipped"),
            },
            Evidence::Missing(reason) => warn!(%side, reason = %reason, "No evidence this round"),
        }
        Ok(())
    }

    fn persist(
        &self,
        state: &TrialState,
        decision: &Decision,
    ) -> Result<PathBuf, OrchestratorError> {
        state.update_status(TrialStatus::GeneratingVerdict)?;
        let record = VerdictRecord::new(
            state.topic(),
            decision,
            state.round(),
            state.evidence(Side::Positive),
            state.evidence(Side::Negative),
        );
        let path = record.write_to(&self.config.output_dir)?;
        state.update_status(TrialStatus::Completed)?;
        Ok(path)
    }

    /// Run a full trial on `topic`.
    pub async fn run(&self, topic: &str) -> Result<TrialOutcome, OrchestratorError> {
        let started = Instant::now();
        let state = TrialState::new(topic, self.config.max_rounds)?;
        state.update_status(TrialStatus::Initialized)?;
        info!(topic = %state.topic(), max_rounds = state.max_rounds(), id = %state.id(), "Trial started");

        while state.can_continue() {
            if !state.increment_round()? {
                break;
            }
            let round = state.round();
            state.update_status(TrialStatus::Researching)?;
            info!(round, max_rounds = state.max_rounds(), "Round started");

            let (pos, neg) = self.research(&state).await;
            Self::merge(&state, Side::Positive, &pos)?;
            Self::merge(&state, Side::Negative, &neg)?;

            state.update_status(TrialStatus::Deliberating)?;
            let summary = state.evidence_summary();
            debug!(
                round,
                pos = summary.positive_count,
                neg = summary.negative_count,
                "Deliberating"
            );
            let decision = self
                .arbiter
                .deliberate(
                    state.topic(),
                    &state.evidence(Side::Positive),
                    &state.evidence(Side::Negative),
                    round,
                )
                .await;

            if decision.accepted() {
                state.update_status(TrialStatus::Accepted)?;
                let verdict_path = self.persist(&state, &decision)?;
                info!(
                    round,
                    forced = decision.is_forced(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Trial completed"
                );
                return Ok(TrialOutcome {
                    verdict: decision.verdict().to_string(),
                    forced: decision.is_forced(),
                    decision,
                    rounds: round,
                    verdict_path,
                });
            }

            state.update_status(TrialStatus::Rejected)?;
            state.set_feedback(
                decision.feedback(),
                Some(decision.suggested_queries(Side::Positive).to_vec()),
                Some(decision.suggested_queries(Side::Negative).to_vec()),
            )?;
            info!(round, state = %state, "Arbiter requested more evidence");
            debug!(feedback = %decision.feedback(), "Arbiter feedback");
        }

        warn!(rounds = state.round(), "Round limit reached without a verdict, forcing termination");
        state.update_status(TrialStatus::ForcedTermination)?;
        let text = compose_forced_verdict(
            state.topic(),
            &state.evidence(Side::Positive),
            &state.evidence(Side::Negative),
        );
        let decision = Decision::forced(&text, state.topic());
        let verdict_path = self.persist(&state, &decision)?;
        Ok(TrialOutcome {
            verdict: decision.verdict().to_string(),
            decision,
            rounds: state.round(),
            forced: true,
            verdict_path,
        })
    }
}

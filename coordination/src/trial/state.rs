//! Trial state machine: statuses, transitions, and evidence ledger.
//!
//! One [`TrialState`] exists per trial run. Every mutation goes through a
//! single lock so that concurrently completing research agents never race on
//! evidence appends, round counters, or status transitions. The lock is held
//! only for the duration of the in-memory update, never across network calls.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Status of a trial run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// State allocated, nothing started.
    Idle,
    /// Topic accepted, ready for the first round.
    Initialized,
    /// Research agents are gathering evidence.
    Researching,
    /// The arbiter is weighing the accumulated evidence.
    Deliberating,
    /// The arbiter signalled a verdict.
    Accepted,
    /// The arbiter asked for another round.
    Rejected,
    /// Rounds exhausted without an accept signal.
    ForcedTermination,
    /// Verdict artifact is being rendered and written.
    GeneratingVerdict,
    /// Trial finished.
    Completed,
}

impl TrialStatus {
    /// Valid transitions from this status.
    pub fn valid_transitions(self) -> &'static [TrialStatus] {
        match self {
            Self::Idle => &[Self::Initialized],
            Self::Initialized => &[Self::Researching],
            Self::Researching => &[Self::Deliberating, Self::Researching],
            Self::Deliberating => &[Self::Accepted, Self::Rejected],
            Self::Rejected => &[Self::Researching, Self::ForcedTermination],
            Self::Accepted | Self::ForcedTermination => &[Self::GeneratingVerdict],
            Self::GeneratingVerdict => &[Self::Completed],
            Self::Completed => &[],
        }
    }

    pub fn can_transition_to(self, next: TrialStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Whether evidence, feedback, or round mutations are allowed.
    pub fn is_mutable(self) -> bool {
        !matches!(self, Self::GeneratingVerdict | Self::Completed)
    }

    /// Statuses in which the research/deliberation loop is still running.
    fn is_in_loop(self) -> bool {
        matches!(self, Self::Rejected | Self::Researching | Self::Deliberating)
    }
}

impl std::fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Initialized => write!(f, "initialized"),
            Self::Researching => write!(f, "researching"),
            Self::Deliberating => write!(f, "deliberating"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
            Self::ForcedTermination => write!(f, "forced_termination"),
            Self::GeneratingVerdict => write!(f, "generating_verdict"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Which side of the trial a piece of evidence or a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Achievements, contributions, legacy.
    Positive,
    /// Controversies, criticism, failures.
    Negative,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Positive, Side::Negative];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// Invariant violations raised by [`TrialState`].
///
/// These indicate a programming defect in the caller, not an external
/// failure, and are never absorbed silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialError {
    #[error("invalid status transition {from} → {to}")]
    InvalidTransition { from: TrialStatus, to: TrialStatus },

    #[error("cannot mutate trial state while status={status}")]
    Immutable { status: TrialStatus },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// A status transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: TrialStatus,
    pub to: TrialStatus,
    /// Round in progress when the transition happened.
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

/// Result of merging a research finding into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Appended; its fingerprint and title are now recorded.
    Added,
    /// Identical content was already recorded (either side).
    DuplicateContent,
    /// A finding from the same source title was already recorded for this side.
    DuplicateTitle,
}

static SOURCE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Title|Page):[ \t]*(.*?)[ \t]*$").expect("valid regex")
});

/// Extract the first source title (`Title:` or `Page:` line) from an evidence block.
pub fn extract_source_title(evidence: &str) -> Option<String> {
    SOURCE_TITLE_RE
        .captures(evidence)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Deterministic content fingerprint used for cross-round duplicate suppression.
pub fn evidence_fingerprint(evidence: &str) -> String {
    blake3::hash(evidence.trim().as_bytes()).to_hex().to_string()
}

#[derive(Debug, Default, Clone)]
struct SideLedger {
    evidence: Vec<String>,
    used_queries: Vec<String>,
    seen_titles: HashSet<String>,
    suggested_queries: Vec<String>,
}

#[derive(Debug)]
struct TrialInner {
    status: TrialStatus,
    round: u32,
    feedback: String,
    positive: SideLedger,
    negative: SideLedger,
    evidence_hashes: HashSet<String>,
    transitions: Vec<StatusTransition>,
}

impl TrialInner {
    fn side(&self, side: Side) -> &SideLedger {
        match side {
            Side::Positive => &self.positive,
            Side::Negative => &self.negative,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideLedger {
        match side {
            Side::Positive => &mut self.positive,
            Side::Negative => &mut self.negative,
        }
    }

    fn ensure_mutable(&self) -> Result<(), TrialError> {
        if self.status.is_mutable() {
            Ok(())
        } else {
            Err(TrialError::Immutable {
                status: self.status,
            })
        }
    }
}

/// Serializable view of a trial at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSnapshot {
    pub id: Uuid,
    pub topic: String,
    pub status: TrialStatus,
    pub round: u32,
    pub max_rounds: u32,
    pub feedback: String,
    pub positive_evidence: Vec<String>,
    pub negative_evidence: Vec<String>,
    pub used_queries_positive: Vec<String>,
    pub used_queries_negative: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Counts and latest entries, for logging and monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub topic: String,
    pub status: TrialStatus,
    pub round: u32,
    pub max_rounds: u32,
    pub feedback: String,
    pub positive_count: usize,
    pub negative_count: usize,
    pub latest_positive: Option<String>,
    pub latest_negative: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Shared state for a single trial run.
///
/// `inner` is a non-reentrant lock: a method holding it must work on the
/// guarded `TrialInner` directly and never call another locking `TrialState`
/// method, or it deadlocks.
#[derive(Debug)]
pub struct TrialState {
    id: Uuid,
    topic: String,
    max_rounds: u32,
    created_at: DateTime<Utc>,
    inner: Mutex<TrialInner>,
}

impl TrialState {
    /// Create a fresh trial in [`TrialStatus::Idle`] at round 0.
    pub fn new(topic: impl Into<String>, max_rounds: u32) -> Result<Self, TrialError> {
        Self::with_round(topic, max_rounds, 0)
    }

    /// Create a trial that starts at an explicit round counter.
    pub fn with_round(
        topic: impl Into<String>,
        max_rounds: u32,
        round: u32,
    ) -> Result<Self, TrialError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(TrialError::InvalidArgument(
                "topic must be a non-empty string".into(),
            ));
        }
        if max_rounds < 1 {
            return Err(TrialError::InvalidArgument(
                "max_rounds must be >= 1".into(),
            ));
        }
        if round > max_rounds {
            return Err(TrialError::InvalidArgument(format!(
                "round ({round}) cannot be greater than max_rounds ({max_rounds})"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            topic,
            max_rounds,
            created_at: Utc::now(),
            inner: Mutex::new(TrialInner {
                status: TrialStatus::Idle,
                round,
                feedback: String::new(),
                positive: SideLedger::default(),
                negative: SideLedger::default(),
                evidence_hashes: HashSet::new(),
                transitions: Vec::new(),
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TrialStatus {
        self.inner.lock().status
    }

    pub fn round(&self) -> u32 {
        self.inner.lock().round
    }

    pub fn feedback(&self) -> String {
        self.inner.lock().feedback.clone()
    }

    pub fn evidence(&self, side: Side) -> Vec<String> {
        self.inner.lock().side(side).evidence.clone()
    }

    pub fn used_queries(&self, side: Side) -> Vec<String> {
        self.inner.lock().side(side).used_queries.clone()
    }

    pub fn suggested_queries(&self, side: Side) -> Vec<String> {
        self.inner.lock().side(side).suggested_queries.clone()
    }

    pub fn transitions(&self) -> Vec<StatusTransition> {
        self.inner.lock().transitions.clone()
    }

    /// Move to `next`, enforcing the transition graph.
    ///
    /// Re-entering the current status is a no-op.
    pub fn update_status(&self, next: TrialStatus) -> Result<(), TrialError> {
        let mut inner = self.inner.lock();
        let current = inner.status;
        if current == next {
            return Ok(());
        }
        if !current.can_transition_to(next) {
            return Err(TrialError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        let round = inner.round;
        inner.status = next;
        inner.transitions.push(StatusTransition {
            from: current,
            to: next,
            round,
            timestamp: Utc::now(),
        });
        debug!(topic = %self.topic, from = %current, to = %next, round, "Trial status transition");
        Ok(())
    }

    /// Advance the round counter. Returns `false` if already at `max_rounds`.
    pub fn increment_round(&self) -> Result<bool, TrialError> {
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        if inner.round >= self.max_rounds {
            return Ok(false);
        }
        inner.round += 1;
        Ok(true)
    }

    /// Append a finding unconditionally, recording its title when given.
    ///
    /// Most callers want [`merge_evidence`](Self::merge_evidence), which
    /// also applies duplicate suppression.
    pub fn add_evidence(
        &self,
        side: Side,
        evidence: &str,
        title: Option<&str>,
    ) -> Result<(), TrialError> {
        let evidence = evidence.trim();
        if evidence.is_empty() {
            return Err(TrialError::InvalidArgument(
                "evidence must be a non-empty string".into(),
            ));
        }
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        let ledger = inner.side_mut(side);
        ledger.evidence.push(evidence.to_string());
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            ledger.seen_titles.insert(title.to_string());
        }
        Ok(())
    }

    /// Merge a finding with content-hash and per-side title deduplication.
    pub fn merge_evidence(&self, side: Side, evidence: &str) -> Result<MergeOutcome, TrialError> {
        let evidence = evidence.trim();
        if evidence.is_empty() {
            return Err(TrialError::InvalidArgument(
                "evidence must be a non-empty string".into(),
            ));
        }
        let fingerprint = evidence_fingerprint(evidence);
        let title = extract_source_title(evidence);

        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;

        if inner.evidence_hashes.contains(&fingerprint) {
            debug!(topic = %self.topic, %side, "Skipping duplicate evidence (content)");
            return Ok(MergeOutcome::DuplicateContent);
        }
        if let Some(ref t) = title {
            if inner.side(side).seen_titles.contains(t) {
                debug!(topic = %self.topic, %side, title = %t, "Skipping duplicate evidence (title)");
                return Ok(MergeOutcome::DuplicateTitle);
            }
        }

        inner.evidence_hashes.insert(fingerprint);
        let ledger = inner.side_mut(side);
        ledger.evidence.push(evidence.to_string());
        if let Some(t) = title {
            ledger.seen_titles.insert(t);
        }
        Ok(MergeOutcome::Added)
    }

    /// Record a query as used for `side`. Blank queries are ignored.
    pub fn record_query(&self, side: Side, query: &str) -> Result<(), TrialError> {
        let query = query.trim();
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        if !query.is_empty() {
            inner.side_mut(side).used_queries.push(query.to_string());
        }
        Ok(())
    }

    /// Store arbiter guidance for the next round.
    ///
    /// Suggested query lists replace the previous ones when given; `None`
    /// leaves them untouched.
    pub fn set_feedback(
        &self,
        feedback: &str,
        suggested_positive: Option<Vec<String>>,
        suggested_negative: Option<Vec<String>>,
    ) -> Result<(), TrialError> {
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        inner.feedback = feedback.trim().to_string();
        if let Some(queries) = suggested_positive {
            inner.positive.suggested_queries = queries;
        }
        if let Some(queries) = suggested_negative {
            inner.negative.suggested_queries = queries;
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().status == TrialStatus::Completed
    }

    /// Whether the round loop may run another iteration.
    pub fn can_continue(&self) -> bool {
        let inner = self.inner.lock();
        if inner.status == TrialStatus::Completed {
            return false;
        }
        !(inner.round >= self.max_rounds && inner.status.is_in_loop())
    }

    pub fn snapshot(&self) -> TrialSnapshot {
        let inner = self.inner.lock();
        TrialSnapshot {
            id: self.id,
            topic: self.topic.clone(),
            status: inner.status,
            round: inner.round,
            max_rounds: self.max_rounds,
            feedback: inner.feedback.clone(),
            positive_evidence: inner.positive.evidence.clone(),
            negative_evidence: inner.negative.evidence.clone(),
            used_queries_positive: inner.positive.used_queries.clone(),
            used_queries_negative: inner.negative.used_queries.clone(),
            created_at: self.created_at,
        }
    }

    pub fn evidence_summary(&self) -> EvidenceSummary {
        let inner = self.inner.lock();
        EvidenceSummary {
            topic: self.topic.clone(),
            status: inner.status,
            round: inner.round,
            max_rounds: self.max_rounds,
            feedback: inner.feedback.clone(),
            positive_count: inner.positive.evidence.len(),
            negative_count: inner.negative.evidence.len(),
            latest_positive: inner.positive.evidence.last().cloned(),
            latest_negative: inner.negative.evidence.last().cloned(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Display for TrialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        write!(
            f,
            "TrialState(topic={:?}, status={}, rounds={}/{}, pos={}, neg={})",
            self.topic,
            inner.status,
            inner.round,
            self.max_rounds,
            inner.positive.evidence.len(),
            inner.negative.evidence.len()
        )
    }
}

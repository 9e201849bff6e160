//! Trial core: the deterministic half of the deliberation loop.
//!
//! ```text
//! Idle → Initialized → Researching ⇄ Deliberating → Accepted ──┐
//!                          ▲             │                      ├→ GeneratingVerdict → Completed
//!                          └──────── Rejected → ForcedTermination ┘
//! ```
//!
//! The async orchestrator in `tribunal-agents` drives these types; nothing
//! here performs I/O except [`VerdictRecord::write_to`].

pub mod decision;
pub mod state;
pub mod verdict;

pub use decision::{
    parse_suggested_queries, Confidence, Decision, SuggestedQueries, EMPTY_REJECTION_FEEDBACK,
    MALFORMED_SIGNAL_FEEDBACK,
};
pub use state::{
    evidence_fingerprint, extract_source_title, EvidenceSummary, MergeOutcome, Side,
    StatusTransition, TrialError, TrialSnapshot, TrialState, TrialStatus,
};
pub use verdict::{compose_forced_verdict, sanitize_topic, PersistenceError, VerdictRecord};

//! Async side of the research tribunal.
//!
//! Two research agents (the Advocate and the Skeptic) query Wikipedia, with
//! a DuckDuckGo fallback, for opposing evidence on a topic. The Arbiter
//! reviews both lists each round and either renders a verdict through the
//! `render_verdict` tool or sends the agents back with feedback. The
//! deterministic rules (state machine, filtering, verdict artifact) live in
//! the `coordination` crate.

pub mod agents;
pub mod backend;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod prompts;
pub mod retriever;
pub mod rig_backend;
pub mod sources;

pub use orchestrator::{OrchestratorError, TrialOrchestrator, TrialOutcome};

//! Full trial runs against scripted doubles, with no network and no model.
//!
//! The backend answers research agents with fixed queries and plays back a
//! queue of arbiter replies; the primary source serves canned pages keyed on
//! query words.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coordination::config::TrialConfig;
use coordination::trial::{Confidence, Side};
use serde_json::json;
use tempfile::TempDir;
use tribunal_agents::agents::{Arbiter, ResearchAgent};
use tribunal_agents::backend::{GenerationBackend, GenerationRequest, ResponsePart, VERDICT_TOOL};
use tribunal_agents::config::BackendConfig;
use tribunal_agents::errors::{BackendError, SourceError};
use tribunal_agents::retriever::EvidenceRetriever;
use tribunal_agents::sources::PrimarySource;
use tribunal_agents::TrialOrchestrator;

const TOPIC: &str = "Test Subject";

// ── Doubles ─────────────────────────────────────────────────────────

struct ScriptedBackend {
    fail_all: bool,
    panic_for: Option<&'static str>,
    arbiter_replies: Mutex<VecDeque<Vec<ResponsePart>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(arbiter_replies: Vec<Vec<ResponsePart>>) -> Arc<Self> {
        Arc::new(Self {
            fail_all: false,
            panic_for: None,
            arbiter_replies: Mutex::new(arbiter_replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn panicking_for(agent: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_all: false,
            panic_for: Some(agent),
            arbiter_replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_all: true,
            panic_for: None,
            arbiter_replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls_by(&self, agent: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|a| *a == agent).count()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ResponsePart>, BackendError> {
        self.calls.lock().unwrap().push(request.agent.clone());
        if self.panic_for == Some(request.agent.as_str()) {
            panic!("{} backend crashed", request.agent);
        }
        if self.fail_all {
            return Err(BackendError::Transport("connection refused".into()));
        }
        let reply = match request.agent.as_str() {
            "advocate" => vec![ResponsePart::Text(format!("\"{TOPIC} achievements\""))],
            "skeptic" => vec![ResponsePart::Text(format!("{TOPIC} controversy\n"))],
            _ => self
                .arbiter_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| vec![ResponsePart::Text("Still insufficient.".into())]),
        };
        Ok(reply)
    }
}

#[derive(Default)]
struct MockWiki {
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl MockWiki {
    fn seen(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrimarySource for MockWiki {
    async fn lookup(&self, query: &str, _count: usize) -> Result<String, SourceError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(SourceError::Status(503));
        }
        let page = if query.contains("fraud") {
            "Page: Test Subject fraud trial\nSummary: In 1901 Test Subject stood trial for fraud."
        } else if ["controversy", "criticism", "scandal"]
            .iter()
            .any(|w| query.contains(w)) {
            "Page: Test Subject\nSummary: Test Subject was accused of plagiarism by rivals."
        } else {
            "Page: Test Subject\nSummary: Test Subject founded a school for orphans."
        };
        Ok(page.to_string())
    }
}

fn mock_backend_config() -> BackendConfig {
    BackendConfig {
        base_url: "http://127.0.0.1:9".into(),
        model: "scripted".into(),
        api_key: "unused".into(),
        research_temperature: 0.7,
        arbiter_temperature: 0.2,
    }
}

fn mock_config(dir: &TempDir, max_rounds: u32) -> Arc<TrialConfig> {
    Arc::new(TrialConfig {
        max_rounds,
        output_dir: dir.path().to_path_buf(),
        ..TrialConfig::default()
    })
}

fn orchestrator(
    backend: Arc<ScriptedBackend>,
    wiki: Arc<MockWiki>,
    config: Arc<TrialConfig>,
) -> TrialOrchestrator {
    let retriever = EvidenceRetriever::new(wiki, config.clone());
    TrialOrchestrator::new(backend, retriever, config, &mock_backend_config())
}

fn accept(verdict: &str, confidence: &str) -> Vec<ResponsePart> {
    vec![ResponsePart::ToolResponse {
        name: VERDICT_TOOL.into(),
        payload: json!({"verdict": verdict, "confidence": confidence}),
    }]
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_round_trial_forces_verdict_and_writes_file() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(Vec::new());
    let wiki = Arc::new(MockWiki::default());
    let outcome = orchestrator(backend, wiki, mock_config(&dir, 1))
        .run(TOPIC)
        .await
        .unwrap();

    assert!(outcome.decision.accepted());
    assert!(outcome.forced);
    assert_eq!(outcome.decision.confidence(), Some(Confidence::Forced));
    assert_eq!(outcome.rounds, 1);
    assert!(!outcome.verdict.trim().is_empty());

    let name = outcome.verdict_path.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("verdict_test_subject_"), "{name}");
    let body = std::fs::read_to_string(&outcome.verdict_path).unwrap();
    assert!(body.contains(TOPIC));
    assert!(body.contains("founded a school"));
    assert!(body.contains("accused of plagiarism"));
    assert!(body.contains("Confidence Score: forced"));
}

#[tokio::test]
async fn test_rejection_steers_next_round_with_suggested_query() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![
        vec![ResponsePart::Text(
            "The Skeptic's case is thin.\n\
             Suggested queries for the Skeptic:\n\
             - \"Test Subject fraud trial\""
                .into(),
        )],
        accept("A generous founder with a contested record.", "high"),
    ]);
    let wiki = Arc::new(MockWiki::default());
    let outcome = orchestrator(backend.clone(), wiki.clone(), mock_config(&dir, 3))
        .run(TOPIC)
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 2);
    assert!(!outcome.forced);
    assert_eq!(outcome.decision.confidence(), Some(Confidence::High));
    assert_eq!(outcome.verdict, "A generous founder with a contested record.");

    // Round 2's skeptic query came from the suggestion, not the backend.
    assert!(wiki.seen().contains(&"Test Subject fraud trial".to_string()));
    assert_eq!(backend.calls_by("skeptic"), 1);
    assert_eq!(backend.calls_by("advocate"), 2);
    assert_eq!(backend.calls_by("arbiter"), 2);

    let body = std::fs::read_to_string(&outcome.verdict_path).unwrap();
    assert!(body.contains("stood trial for fraud"));
    // The repeated advocate page was deduplicated.
    assert_eq!(body.matches("founded a school").count(), 1);
}

#[tokio::test]
async fn test_failing_backend_still_produces_verdict() {
    let dir = TempDir::new().unwrap();
    let wiki = Arc::new(MockWiki::default());
    let outcome = orchestrator(ScriptedBackend::failing(), wiki.clone(), mock_config(&dir, 2))
        .run(TOPIC)
        .await
        .unwrap();

    assert_eq!(outcome.rounds, 2);
    assert!(outcome.decision.is_forced());
    assert!(outcome.verdict.contains(TOPIC));

    let seen = wiki.seen();
    assert!(seen.contains(&"Test Subject achievements legacy".to_string()));
    assert!(seen.contains(&"Test Subject scandal failures".to_string()));

    let body = std::fs::read_to_string(&outcome.verdict_path).unwrap();
    assert_eq!(body.matches("accused of plagiarism").count(), 1);
}

#[tokio::test]
async fn test_unreachable_source_leaves_cases_empty() {
    let dir = TempDir::new().unwrap();
    let wiki = Arc::new(MockWiki {
        fail: true,
        ..MockWiki::default()
    });
    let outcome = orchestrator(ScriptedBackend::new(Vec::new()), wiki.clone(), mock_config(&dir, 1))
        .run(TOPIC)
        .await
        .unwrap();

    assert!(outcome.decision.accepted());
    // Primary query plus the profile fallback query, per side.
    assert_eq!(wiki.seen().len(), 4);
    let body = std::fs::read_to_string(&outcome.verdict_path).unwrap();
    assert!(body.contains("(No positive evidence gathered)"));
    assert!(body.contains("(No negative evidence gathered)"));
}

#[tokio::test]
async fn test_parallel_research_matches_sequential() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(TrialConfig {
        max_rounds: 1,
        output_dir: dir.path().to_path_buf(),
        parallel_research: true,
        ..TrialConfig::default()
    });
    let outcome = orchestrator(
        ScriptedBackend::new(vec![accept("Balanced.", "medium")]),
        Arc::new(MockWiki::default()),
        config,
    )
    .run(TOPIC)
    .await
    .unwrap();

    assert!(!outcome.forced);
    let body = std::fs::read_to_string(&outcome.verdict_path).unwrap();
    assert!(body.contains("founded a school"));
    assert!(body.contains("accused of plagiarism"));
}

async fn run_with_crashing_advocate(parallel_research: bool) {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(TrialConfig {
        max_rounds: 1,
        output_dir: dir.path().to_path_buf(),
        parallel_research,
        ..TrialConfig::default()
    });
    let backend = ScriptedBackend::panicking_for("advocate");
    let outcome = orchestrator(backend.clone(), Arc::new(MockWiki::default()), config)
        .run(TOPIC)
        .await
        .unwrap();

    assert!(outcome.decision.accepted());
    assert_eq!(outcome.rounds, 1);
    assert_eq!(backend.calls_by("skeptic"), 1);
    assert_eq!(backend.calls_by("arbiter"), 1);

    let body = std::fs::read_to_string(&outcome.verdict_path).unwrap();
    assert!(body.contains("accused of plagiarism"));
    assert!(body.contains("(No positive evidence gathered)"));
}

#[tokio::test]
async fn test_crashing_agent_sequential_round_still_deliberates() {
    run_with_crashing_advocate(false).await;
}

#[tokio::test]
async fn test_crashing_agent_parallel_round_still_deliberates() {
    run_with_crashing_advocate(true).await;
}

#[tokio::test]
async fn test_round_limit_without_accept_composes_forced_verdict() {
    let dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(Vec::new());
    let wiki = Arc::new(MockWiki::default());
    let trial_config = mock_config(&dir, 1);

    // An arbiter that believes more rounds remain never forces acceptance,
    // so the orchestrator's own termination path closes the trial.
    let lenient = Arc::new(TrialConfig {
        max_rounds: 5,
        ..(*trial_config).clone()
    });
    let retriever = EvidenceRetriever::new(wiki, trial_config.clone());
    let research = |side| ResearchAgent::new(side, backend.clone(), retriever.clone(), &trial_config, 0.7);
    let orch = TrialOrchestrator::from_parts(
        research(Side::Positive),
        research(Side::Negative),
        Arbiter::new(backend.clone(), lenient, 0.2),
        trial_config.clone(),
    );

    let outcome = orch.run(TOPIC).await.unwrap();
    assert!(outcome.forced);
    assert!(outcome
        .verdict
        .starts_with("FORCED VERDICT (Max Rounds Reached) for 'Test Subject'"));
    assert!(outcome.verdict.contains("=== CRITICAL EVIDENCE ==="));
    assert_eq!(
        outcome.decision.summary().unwrap()["reason"],
        "max rounds reached"
    );
}

#[tokio::test]
async fn test_blank_topic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = orchestrator(
        ScriptedBackend::new(Vec::new()),
        Arc::new(MockWiki::default()),
        mock_config(&dir, 1),
    )
    .run("   ")
    .await;
    assert!(result.is_err());
}

//! Verdict artifact: forced-verdict synthesis and the plain-text record
//! written once at the end of a trial.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use super::decision::{Confidence, Decision};

const RULE: &str = "================================================================";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write verdict to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize verdict summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Build the verdict text used when the round limit ends the trial without
/// an accept signal. Duplicate evidence is dropped, first occurrence wins.
pub fn compose_forced_verdict(topic: &str, positive: &[String], negative: &[String]) -> String {
    let pos = join_unique(positive, "No specific positive evidence gathered.");
    let neg = join_unique(negative, "No specific negative evidence gathered.");
    format!(
        "FORCED VERDICT (Max Rounds Reached) for '{topic}'\n\n\
         === POSITIVE EVIDENCE ===\n{pos}\n\n\
         === CRITICAL EVIDENCE ===\n{neg}\n\n\
         === CONCLUSION ===\n\
         The significance of {topic} is contested. The tribunal reached its round limit \
         without a reasoned verdict and acknowledges both the achievements and the \
         controversies presented above."
    )
}

fn join_unique(items: &[String], empty: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<&str> = items
        .iter()
        .map(String::as_str)
        .filter(|item| seen.insert(*item))
        .collect();
    if unique.is_empty() {
        empty.to_string()
    } else {
        unique.join("\n\n")
    }
}

/// Lowercase the topic and map every non-alphanumeric character to `_`.
pub fn sanitize_topic(topic: &str) -> String {
    topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Everything needed to render the final artifact.
#[derive(Debug, Clone)]
pub struct VerdictRecord {
    pub topic: String,
    pub verdict: String,
    pub rounds: u32,
    pub confidence: Option<Confidence>,
    pub summary: Option<Map<String, Value>>,
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub issued_at: DateTime<Local>,
}

impl VerdictRecord {
    pub fn new(
        topic: &str,
        decision: &Decision,
        rounds: u32,
        positive: Vec<String>,
        negative: Vec<String>,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            verdict: decision.verdict().to_string(),
            rounds,
            confidence: decision.confidence(),
            summary: decision.summary().cloned(),
            positive,
            negative,
            issued_at: Local::now(),
        }
    }

    /// `verdict_{sanitized-topic}_{YYYYMMDD_HHMMSS}.txt`
    pub fn file_name(&self) -> String {
        format!(
            "verdict_{}_{}.txt",
            sanitize_topic(&self.topic),
            self.issued_at.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn render(&self) -> Result<String, PersistenceError> {
        let confidence = self
            .confidence
            .map(|c| format!("Confidence Score: {c}\n"))
            .unwrap_or_default();
        let summary = match self.summary.as_ref().filter(|s| !s.is_empty()) {
            Some(map) => format!("Key Factors:\n{}\n", serde_json::to_string_pretty(map)?),
            None => String::new(),
        };
        let pos = case_text(&self.positive, "(No positive evidence gathered)");
        let neg = case_text(&self.negative, "(No negative evidence gathered)");

        Ok(format!(
            "{RULE}\nTHE HISTORICAL TRIBUNAL - VERDICT\n{RULE}\n\
             Topic: {topic}\n\
             Date: {date}\n\
             Rounds: {rounds}\n\
             {confidence}{RULE}\n\n\
             THE ADVOCATE'S CASE:\n{pos}\n\n\
             THE SKEPTIC'S CASE:\n{neg}\n\n\
             FINAL VERDICT:\n{verdict}\n\n\
             {summary}{RULE}\n",
            topic = self.topic,
            date = self.issued_at.format("%Y-%m-%d %H:%M:%S"),
            rounds = self.rounds,
            verdict = self.verdict,
        ))
    }

    /// Render and write into `dir`, creating it if needed. Returns the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, PersistenceError> {
        let path = dir.join(self.file_name());
        let content = self.render()?;
        std::fs::create_dir_all(dir)
            .and_then(|()| std::fs::write(&path, content))
            .map_err(|source| PersistenceError::Write {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "Verdict saved");
        Ok(path)
    }
}

fn case_text(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join("\n\n")
    }
}

//! Arbiter decisions: accept/reject value object and verdict-signal validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::Side;

/// Corrective feedback returned when the verdict tool is called without a
/// usable verdict or confidence.
pub const MALFORMED_SIGNAL_FEEDBACK: &str = "Your render_verdict tool call was malformed or incomplete. \
If accepting, you must call render_verdict with verdict (string) and confidence (low|medium|high). \
Otherwise, provide feedback without calling tools.";

/// Feedback used when the arbiter neither calls the tool nor writes anything.
pub const EMPTY_REJECTION_FEEDBACK: &str =
    "Insufficient evidence formatting/quality. Provide 2-3 concrete, verifiable facts per side.";

/// Confidence attached to an accepted verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
    /// Verdict produced by the round limit rather than the arbiter's judgement.
    Forced,
}

impl Confidence {
    /// Parse `low|medium|high` or any `forced…` marker, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            s if s.starts_with("forced") => Some(Self::Forced),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Forced => write!(f, "forced"),
        }
    }
}

/// Outcome of one deliberation call. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    accepted: bool,
    verdict: String,
    confidence: Option<Confidence>,
    summary: Option<Map<String, Value>>,
    feedback: String,
    suggested_positive: Vec<String>,
    suggested_negative: Vec<String>,
}

impl Decision {
    pub fn accept(
        verdict: impl Into<String>,
        confidence: Confidence,
        summary: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            accepted: true,
            verdict: verdict.into().trim().to_string(),
            confidence: Some(confidence),
            summary,
            feedback: String::new(),
            suggested_positive: Vec::new(),
            suggested_negative: Vec::new(),
        }
    }

    /// A rejection. Suggested-query sections in `feedback` are parsed out.
    pub fn reject(feedback: impl Into<String>) -> Self {
        let feedback = feedback.into().trim().to_string();
        let suggestions = parse_suggested_queries(&feedback);
        Self {
            accepted: false,
            verdict: String::new(),
            confidence: None,
            summary: None,
            feedback,
            suggested_positive: suggestions.positive,
            suggested_negative: suggestions.negative,
        }
    }

    /// A forced acceptance at the round limit. Blank text gets a placeholder.
    pub fn forced(text: &str, topic: &str) -> Self {
        let text = text.trim();
        let verdict = if text.is_empty() {
            format!(
                "The tribunal reached its final round on '{topic}' without a reasoned verdict. \
                 The gathered evidence is presented as-is for the reader to weigh."
            )
        } else {
            text.to_string()
        };
        let mut summary = Map::new();
        summary.insert("reason".into(), Value::String("max rounds reached".into()));
        Self::accept(verdict, Confidence::Forced, Some(summary))
    }

    /// Validate a verdict-tool payload.
    ///
    /// A payload without a non-empty `verdict` or with an unrecognised
    /// `confidence` becomes a rejection carrying [`MALFORMED_SIGNAL_FEEDBACK`].
    pub fn from_verdict_signal(payload: &Value) -> Self {
        let verdict = payload
            .get("verdict")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        let confidence = payload
            .get("confidence")
            .and_then(Value::as_str)
            .and_then(Confidence::parse);

        match confidence {
            Some(confidence) if !verdict.is_empty() => {
                let summary = payload.get("summary").and_then(Value::as_object).cloned();
                Self::accept(verdict, confidence, summary)
            }
            _ => Self::reject(MALFORMED_SIGNAL_FEEDBACK),
        }
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    pub fn verdict(&self) -> &str {
        &self.verdict
    }

    pub fn confidence(&self) -> Option<Confidence> {
        self.confidence
    }

    pub fn summary(&self) -> Option<&Map<String, Value>> {
        self.summary.as_ref()
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn suggested_queries(&self, side: Side) -> &[String] {
        match side {
            Side::Positive => &self.suggested_positive,
            Side::Negative => &self.suggested_negative,
        }
    }

    pub fn is_forced(&self) -> bool {
        self.confidence == Some(Confidence::Forced)
    }

    pub fn status_line(&self) -> String {
        if self.accepted {
            format!(
                "accepted (confidence: {})",
                self.confidence
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".into())
            )
        } else {
            format!(
                "rejected ({} positive / {} negative suggestions)",
                self.suggested_positive.len(),
                self.suggested_negative.len()
            )
        }
    }
}

// ── Suggested-query parsing ─────────────────────────────────────────

const POSITIVE_LABELS: &[&str] = &["positive", "advocate", "admirer"];
const NEGATIVE_LABELS: &[&str] = &["negative", "skeptic", "critic"];

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s*(.*)$").expect("valid regex")
});

static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("valid regex")
});

/// Suggested queries pulled out of free-text rejection feedback.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SuggestedQueries {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

fn header_side(line: &str) -> Option<Option<Side>> {
    let lowered = line.to_lowercase();
    let idx = lowered.find("suggested queries for")?;
    let label = &lowered[idx + "suggested queries for".len()..];
    if POSITIVE_LABELS.iter().any(|l| label.contains(l)) {
        Some(Some(Side::Positive))
    } else if NEGATIVE_LABELS.iter().any(|l| label.contains(l)) {
        Some(Some(Side::Negative))
    } else {
        Some(None)
    }
}

fn bullet_query(content: &str) -> String {
    if let Some(caps) = QUOTED_RE.captures(content) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            return m.as_str().trim().to_string();
        }
    }
    content
        .trim()
        .trim_matches(|c: char| c == '`' || c == '*')
        .trim()
        .to_string()
}

/// Parse "suggested queries for <agent>" bulleted sections.
///
/// Quoted strings inside a bullet win over the raw bullet text. A section
/// ends at the next header or the first non-bullet, non-blank line.
pub fn parse_suggested_queries(feedback: &str) -> SuggestedQueries {
    let mut out = SuggestedQueries::default();
    let mut current: Option<Side> = None;

    for line in feedback.lines() {
        if let Some(side) = header_side(line) {
            current = side;
            continue;
        }
        let Some(side) = current else { continue };
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = BULLET_RE.captures(line) else {
            current = None;
            continue;
        };
        let query = bullet_query(caps.get(1).map_or("", |m| m.as_str()));
        if query.is_empty() {
            continue;
        }
        let target = match side {
            Side::Positive => &mut out.positive,
            Side::Negative => &mut out.negative,
        };
        if !target.contains(&query) {
            target.push(query);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse(" HIGH "), Some(Confidence::High));
        assert_eq!(Confidence::parse("medium"), Some(Confidence::Medium));
        assert_eq!(
            Confidence::parse("FORCED - Insufficient Evidence"),
            Some(Confidence::Forced)
        );
        assert_eq!(Confidence::parse("certain"), None);
        assert_eq!(Confidence::parse(""), None);
    }

    #[test]
    fn test_valid_signal_accepts() {
        let d = Decision::from_verdict_signal(&json!({
            "verdict": "  A balanced verdict. ",
            "confidence": "High",
            "summary": {"key": "value"}
        }));
        assert!(d.accepted());
        assert_eq!(d.verdict(), "A balanced verdict.");
        assert_eq!(d.confidence(), Some(Confidence::High));
        assert_eq!(d.summary().unwrap()["key"], "value");
    }

    #[test]
    fn test_non_object_summary_dropped() {
        let d = Decision::from_verdict_signal(&json!({
            "verdict": "v", "confidence": "low", "summary": "text"
        }));
        assert!(d.accepted());
        assert!(d.summary().is_none());
    }

    #[test]
    fn test_malformed_signal_rejects() {
        for payload in [
            json!({"verdict": "", "confidence": "high"}),
            json!({"verdict": "v", "confidence": "very"}),
            json!({"verdict": "v"}),
            json!("not an object"),
        ] {
            let d = Decision::from_verdict_signal(&payload);
            assert!(!d.accepted(), "payload {payload} should reject");
            assert_eq!(d.feedback(), MALFORMED_SIGNAL_FEEDBACK);
        }
    }

    #[test]
    fn test_forced_placeholder() {
        let d = Decision::forced("   ", "Napoleon");
        assert!(d.accepted());
        assert!(d.is_forced());
        assert!(d.verdict().contains("Napoleon"));
        assert_eq!(d.summary().unwrap()["reason"], "max rounds reached");

        let d = Decision::forced("Partial reasoning.", "Napoleon");
        assert_eq!(d.verdict(), "Partial reasoning.");
    }

    #[test]
    fn test_reject_parses_sections() {
        let feedback = "The negative side is thin.\n\
            \n\
            Suggested queries for the Advocate:\n\
            - \"Marie Curie Nobel Prize chemistry\"\n\
            - Marie Curie radium institute\n\
            \n\
            Suggested queries for the Skeptic:\n\
            1. “Marie Curie radiation exposure”\n\
            2) `Marie Curie laboratory safety`\n\
            Please focus on primary sources.\n\
            - not a suggestion";
        let d = Decision::reject(feedback);
        assert!(!d.accepted());
        assert_eq!(
            d.suggested_queries(Side::Positive),
            &[
                "Marie Curie Nobel Prize chemistry".to_string(),
                "Marie Curie radium institute".to_string()
            ]
        );
        assert_eq!(
            d.suggested_queries(Side::Negative),
            &[
                "Marie Curie radiation exposure".to_string(),
                "Marie Curie laboratory safety".to_string()
            ]
        );
        assert_eq!(d.feedback(), feedback.trim());
    }

    #[test]
    fn test_reject_without_sections() {
        let d = Decision::reject("Need more detail on both sides.");
        assert!(d.suggested_queries(Side::Positive).is_empty());
        assert!(d.suggested_queries(Side::Negative).is_empty());
        assert!(d.status_line().starts_with("rejected"));
    }

    #[test]
    fn test_unknown_header_label_ignored() {
        let parsed = parse_suggested_queries("Suggested queries for everyone:\n- \"x\"");
        assert_eq!(parsed, SuggestedQueries::default());
    }
}

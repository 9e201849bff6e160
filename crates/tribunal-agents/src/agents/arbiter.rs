//! The Arbiter: weighs both evidence lists and accepts or rejects.
//!
//! Accepting is signalled through the verdict tool; plain text is
//! rejection feedback. At the final round a non-accepting answer is turned
//! into a forced acceptance, so the last deliberation always yields a
//! verdict.

use std::sync::Arc;

use coordination::config::TrialConfig;
use coordination::retrieval::format_evidence_list;
use coordination::trial::{Decision, EMPTY_REJECTION_FEEDBACK};
use tracing::{info, warn};

use crate::backend::{
    extract_text, extract_tool_payload, GenerationBackend, GenerationRequest, VERDICT_TOOL,
};
use crate::errors::{with_retry, BackendError};
use crate::prompts::arbiter_preamble;

const RATE_LIMIT_FEEDBACK: &str = "The Arbiter is temporarily rate limited by the model provider. \
Continue gathering concrete, verifiable evidence for both sides; the review will resume next round.";
const INTERNAL_ERROR_FEEDBACK: &str = "The Arbiter hit an internal error while reviewing the evidence. \
Continue gathering concrete, verifiable evidence for both sides.";

pub struct Arbiter {
    backend: Arc<dyn GenerationBackend>,
    config: Arc<TrialConfig>,
    temperature: f64,
}

impl Arbiter {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: Arc<TrialConfig>, temperature: f64) -> Self {
        Self {
            backend,
            config,
            temperature,
        }
    }

    fn build_prompt(&self, topic: &str, positive: &[String], negative: &[String], round: u32) -> String {
        let item = self.config.evidence_item_chars;
        let total = self.config.evidence_total_chars;
        let mut prompt = format!(
            "TOPIC: {topic}\nROUND: {round} of {}\n\n\
             === THE ADVOCATE'S EVIDENCE (positive) ===\n{}\n\n\
             === THE SKEPTIC'S EVIDENCE (negative) ===\n{}\n\n",
            self.config.max_rounds,
            format_evidence_list(positive, item, total),
            format_evidence_list(negative, item, total),
        );
        if round >= self.config.max_rounds {
            prompt.push_str(&format!(
                "This is the final round. You MUST call {VERDICT_TOOL} now with the evidence available."
            ));
        } else {
            prompt.push_str(&format!(
                "Either call {VERDICT_TOOL} to accept, or reply with feedback to continue the trial."
            ));
        }
        prompt
    }

    fn failure_feedback(&self, err: &BackendError) -> String {
        let base = if err.is_rate_limited() {
            RATE_LIMIT_FEEDBACK
        } else {
            INTERNAL_ERROR_FEEDBACK
        };
        if self.config.expose_error_details {
            format!("{base}\n\nDetails: {err}")
        } else {
            base.to_string()
        }
    }

    /// Review the accumulated evidence for `round`.
    pub async fn deliberate(
        &self,
        topic: &str,
        positive: &[String],
        negative: &[String],
        round: u32,
    ) -> Decision {
        let request = GenerationRequest::new(
            "arbiter",
            arbiter_preamble(round, self.config.max_rounds),
            self.build_prompt(topic, positive, negative, round),
        )
        .with_verdict_tool()
        .with_temperature(self.temperature);

        let (decision, text) =
            match with_retry(&self.config.arbiter_retry, "arbiter", || self.backend.generate(&request))
                .await
            {
                Ok(parts) => {
                    let text = extract_text(&parts).unwrap_or_default();
                    let decision = match extract_tool_payload(&parts, VERDICT_TOOL) {
                        Some(payload) => Decision::from_verdict_signal(&payload),
                        None if text.is_empty() => Decision::reject(EMPTY_REJECTION_FEEDBACK),
                        None => Decision::reject(text.as_str()),
                    };
                    (decision, text)
                }
                Err(e) => {
                    warn!(round, error = %e, "Arbiter call failed");
                    (Decision::reject(self.failure_feedback(&e)), String::new())
                }
            };

        if round >= self.config.max_rounds && !decision.accepted() {
            info!(round, "Final round without an accept signal, forcing verdict");
            return Decision::forced(&text, topic);
        }
        info!(round, status = %decision.status_line(), "Arbiter decided");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResponsePart;
    use async_trait::async_trait;
    use coordination::trial::{Confidence, Side, MALFORMED_SIGNAL_FEEDBACK};
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<Result<Vec<ResponsePart>, BackendError>>>);

    impl Scripted {
        fn new(mut replies: Vec<Result<Vec<ResponsePart>, BackendError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self(Mutex::new(replies)))
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<Vec<ResponsePart>, BackendError> {
            assert!(request.verdict_tool);
            self.0
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BackendError::Transport("script exhausted".into())))
        }
    }

    fn arbiter(backend: Arc<Scripted>, max_rounds: u32) -> Arbiter {
        let config = TrialConfig {
            max_rounds,
            ..TrialConfig::default()
        };
        Arbiter::new(backend, Arc::new(config), 0.2)
    }

    fn evidence() -> Vec<String> {
        vec!["Title: A\nSummary: fact.".to_string()]
    }

    #[tokio::test]
    async fn test_tool_call_accepts() {
        let backend = Scripted::new(vec![Ok(vec![ResponsePart::ToolResponse {
            name: VERDICT_TOOL.into(),
            payload: json!({"verdict": "Balanced.", "confidence": "medium"}),
        }])]);
        let d = arbiter(backend, 3).deliberate("T", &evidence(), &evidence(), 1).await;
        assert!(d.accepted());
        assert_eq!(d.verdict(), "Balanced.");
        assert_eq!(d.confidence(), Some(Confidence::Medium));
    }

    #[tokio::test]
    async fn test_text_rejects_with_suggestions() {
        let feedback = "Skeptic needs more.\nSuggested queries for the Skeptic:\n- \"T scandal\"";
        let backend = Scripted::new(vec![Ok(vec![ResponsePart::Text(feedback.into())])]);
        let d = arbiter(backend, 3).deliberate("T", &evidence(), &[], 1).await;
        assert!(!d.accepted());
        assert_eq!(d.suggested_queries(Side::Negative), ["T scandal".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_reply_rejects_with_default_feedback() {
        let backend = Scripted::new(vec![Ok(vec![ResponsePart::Text("  ".into())])]);
        let d = arbiter(backend, 3).deliberate("T", &[], &[], 1).await;
        assert_eq!(d.feedback(), EMPTY_REJECTION_FEEDBACK);
    }

    #[tokio::test]
    async fn test_malformed_signal_rejects_before_final_round() {
        let backend = Scripted::new(vec![Ok(vec![ResponsePart::ToolCall {
            name: VERDICT_TOOL.into(),
            args: json!({"verdict": "v", "confidence": "certain"}),
        }])]);
        let d = arbiter(backend, 3).deliberate("T", &[], &[], 2).await;
        assert!(!d.accepted());
        assert_eq!(d.feedback(), MALFORMED_SIGNAL_FEEDBACK);
    }

    #[tokio::test]
    async fn test_final_round_forces_acceptance() {
        let backend = Scripted::new(vec![Ok(vec![
            ResponsePart::ToolCall {
                name: VERDICT_TOOL.into(),
                args: json!({"verdict": ""}),
            },
            ResponsePart::Text("Both sides are thin but the record is mixed.".into()),
        ])]);
        let d = arbiter(backend, 2).deliberate("T", &evidence(), &evidence(), 2).await;
        assert!(d.accepted());
        assert!(d.is_forced());
        assert_eq!(d.verdict(), "Both sides are thin but the record is mixed.");
    }

    #[tokio::test]
    async fn test_final_round_failure_still_forces() {
        let backend = Scripted::new(vec![Err(BackendError::Transport("down".into()))]);
        let d = arbiter(backend, 1).deliberate("Topic X", &[], &[], 1).await;
        assert!(d.accepted());
        assert!(d.verdict().contains("Topic X"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_feedback_after_retries() {
        let backend = Scripted::new(vec![
            Err(BackendError::RateLimited("429".into())),
            Err(BackendError::RateLimited("429".into())),
            Err(BackendError::RateLimited("429".into())),
        ]);
        let d = arbiter(backend, 3).deliberate("T", &[], &[], 1).await;
        assert!(!d.accepted());
        assert!(d.feedback().contains("rate limited"));
        assert!(!d.feedback().contains("Details"));
    }

    #[tokio::test]
    async fn test_error_details_exposed_when_configured() {
        let config = TrialConfig {
            expose_error_details: true,
            ..TrialConfig::default()
        };
        let backend = Scripted::new(vec![Err(BackendError::Transport("socket closed".into()))]);
        let a = Arbiter::new(backend, Arc::new(config), 0.2);
        let d = a.deliberate("T", &[], &[], 1).await;
        assert!(d.feedback().contains("internal error"));
        assert!(d.feedback().contains("socket closed"));
    }
}

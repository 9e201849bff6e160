//! [`GenerationBackend`] over rig's OpenAI-compatible completions client.
//!
//! A fresh agent is built per request so the role instruction (which for the
//! arbiter embeds the round number) is always current. When the verdict tool
//! is exposed, its invocation is captured and surfaced as tool parts ahead of
//! the final text.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{Prompt, ToolDefinition};
use rig::providers::openai;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::{GenerationBackend, GenerationRequest, ResponsePart, VERDICT_TOOL};
use crate::config::BackendConfig;
use crate::errors::BackendError;

/// Type alias for agents built from OpenAI-compatible endpoints.
pub type OaiAgent = Agent<openai::completion::CompletionModel>;

const DEFAULT_TEMPERATURE: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Arguments as the model supplies them. Everything is optional so that an
/// incomplete call still reaches validation instead of failing to decode.
#[derive(Debug, Deserialize)]
pub struct VerdictArgs {
    #[serde(default)]
    pub verdict: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub summary: Option<Value>,
}

#[derive(Debug, Clone)]
struct CapturedCall {
    args: Value,
    payload: Value,
}

/// Records the arbiter's accept signal.
pub struct VerdictTool {
    slot: Arc<Mutex<Option<CapturedCall>>>,
}

impl Tool for VerdictTool {
    const NAME: &'static str = VERDICT_TOOL;
    type Error = ToolError;
    type Args = VerdictArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: VERDICT_TOOL.into(),
            description: "Accept the trial and render the final verdict. \
                          Call only when the evidence on both sides is sufficient, \
                          or when this is the final round."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "verdict": {
                        "type": "string",
                        "description": "Balanced, formal verdict weighing both sides"
                    },
                    "confidence": {
                        "type": "string",
                        "enum": ["low", "medium", "high"],
                        "description": "Confidence in the verdict"
                    },
                    "summary": {
                        "type": "object",
                        "description": "Optional key factors, as a flat object"
                    }
                },
                "required": ["verdict", "confidence"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let raw = json!({
            "verdict": args.verdict,
            "confidence": args.confidence,
            "summary": args.summary,
        });
        let mut payload = serde_json::Map::new();
        payload.insert(
            "verdict".into(),
            Value::String(args.verdict.unwrap_or_default().trim().to_string()),
        );
        payload.insert(
            "confidence".into(),
            Value::String(args.confidence.unwrap_or_default().trim().to_lowercase()),
        );
        if let Some(summary) = args.summary {
            payload.insert("summary".into(), summary);
        }
        let payload = Value::Object(payload);
        let out = serde_json::to_string(&payload)?;

        *self.slot.lock().await = Some(CapturedCall { args: raw, payload });
        Ok(out)
    }
}

/// Rig-backed generation over one OpenAI-compatible endpoint.
pub struct RigBackend {
    client: openai::CompletionsClient,
    model: String,
    max_tool_turns: usize,
}

impl RigBackend {
    pub fn new(config: &BackendConfig, max_tool_turns: usize) -> Result<Self> {
        let client = openai::CompletionsClient::builder()
            .api_key(&config.api_key)
            .base_url(&config.base_url)
            .build()
            .context("Failed to build completions client")?;
        Ok(Self {
            client,
            model: config.model.clone(),
            max_tool_turns: max_tool_turns.max(1),
        })
    }

    fn build_plain(&self, request: &GenerationRequest) -> OaiAgent {
        self.client
            .agent(self.model.as_str())
            .name(request.agent.as_str())
            .preamble(request.instruction.as_str())
            .temperature(request.temperature.unwrap_or(DEFAULT_TEMPERATURE))
            .build()
    }

    fn build_with_verdict_tool(
        &self,
        request: &GenerationRequest,
        slot: Arc<Mutex<Option<CapturedCall>>>,
    ) -> OaiAgent {
        self.client
            .agent(self.model.as_str())
            .name(request.agent.as_str())
            .preamble(request.instruction.as_str())
            .temperature(request.temperature.unwrap_or(DEFAULT_TEMPERATURE))
            .tool(VerdictTool { slot })
            .default_max_turns(self.max_tool_turns)
            .build()
    }
}

#[async_trait]
impl GenerationBackend for RigBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ResponsePart>, BackendError> {
        let slot = Arc::new(Mutex::new(None));
        let agent = if request.verdict_tool {
            self.build_with_verdict_tool(request, slot.clone())
        } else {
            self.build_plain(request)
        };

        let result = agent.prompt(request.prompt.as_str()).await;

        let mut parts = Vec::new();
        if let Some(call) = slot.lock().await.take() {
            parts.push(ResponsePart::ToolCall {
                name: VERDICT_TOOL.into(),
                args: call.args,
            });
            parts.push(ResponsePart::ToolResponse {
                name: VERDICT_TOOL.into(),
                payload: call.payload,
            });
        }

        match result {
            Ok(text) => {
                parts.push(ResponsePart::Text(text));
                Ok(parts)
            }
            // The tool fired but the turn loop ended abnormally (e.g. turn
            // budget spent); the captured signal is still authoritative.
            Err(e) if !parts.is_empty() => {
                debug!(agent = %request.agent, error = %e, "Prompt ended after verdict tool call");
                Ok(parts)
            }
            Err(e) => Err(BackendError::classify(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verdict_tool_normalises_and_captures() {
        let slot = Arc::new(Mutex::new(None));
        let tool = VerdictTool { slot: slot.clone() };
        let out = tool
            .call(VerdictArgs {
                verdict: Some("  Mixed legacy.  ".into()),
                confidence: Some(" HIGH ".into()),
                summary: Some(json!({"pro": "reforms"})),
            })
            .await
            .unwrap();

        let decoded: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(decoded["verdict"], "Mixed legacy.");
        assert_eq!(decoded["confidence"], "high");

        let captured = slot.lock().await.take().unwrap();
        assert_eq!(captured.payload, decoded);
        assert_eq!(captured.args["confidence"], " HIGH ");
    }

    #[tokio::test]
    async fn test_verdict_tool_tolerates_missing_fields() {
        let slot = Arc::new(Mutex::new(None));
        let tool = VerdictTool { slot: slot.clone() };
        let args: VerdictArgs = serde_json::from_value(json!({"verdict": "only"})).unwrap();
        let out = tool.call(args).await.unwrap();
        let decoded: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(decoded["confidence"], "");
        assert!(decoded.get("summary").is_none());
    }

    #[tokio::test]
    async fn test_definition_names_tool() {
        let tool = VerdictTool {
            slot: Arc::new(Mutex::new(None)),
        };
        let def = tool.definition(String::new()).await;
        assert_eq!(def.name, VERDICT_TOOL);
        assert_eq!(def.parameters["required"][0], "verdict");
    }
}

//! Text-generation backend seam.
//!
//! Agents talk to a [`GenerationBackend`] and receive a flat list of
//! [`ResponsePart`]s. Adapters convert their native response shape into
//! these parts once, at the boundary, so extraction logic never has to
//! guess at field names.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::BackendError;

/// Name of the single tool the arbiter may call to accept a trial.
pub const VERDICT_TOOL: &str = "render_verdict";

/// One generation call: a role instruction plus a user prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Agent name, used for logging and backend-side labelling.
    pub agent: String,
    /// System/role instruction.
    pub instruction: String,
    pub prompt: String,
    /// Expose the verdict tool for this call.
    pub verdict_tool: bool,
    pub temperature: Option<f64>,
}

impl GenerationRequest {
    pub fn new(
        agent: impl Into<String>,
        instruction: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            instruction: instruction.into(),
            prompt: prompt.into(),
            verdict_tool: false,
            temperature: None,
        }
    }

    pub fn with_verdict_tool(mut self) -> Self {
        self.verdict_tool = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One element of a backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    /// Plain model output.
    Text(String),
    /// The model asked to invoke a tool with these arguments.
    ToolCall { name: String, args: Value },
    /// The tool ran and produced this payload.
    ToolResponse { name: String, payload: Value },
}

impl ResponsePart {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Payload for tool `tool`, whether from the call or its response.
    ///
    /// String payloads holding JSON are decoded.
    pub fn tool_payload(&self, tool: &str) -> Option<Value> {
        let (name, value) = match self {
            Self::ToolCall { name, args } => (name, args),
            Self::ToolResponse { name, payload } => (name, payload),
            Self::Text(_) => return None,
        };
        if name != tool {
            return None;
        }
        match value {
            Value::String(s) => serde_json::from_str(s).ok(),
            other => Some(other.clone()),
        }
    }
}

/// Last non-blank text part, trimmed.
pub fn extract_text(parts: &[ResponsePart]) -> Option<String> {
    parts
        .iter()
        .rev()
        .filter_map(ResponsePart::text)
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Latest payload for `tool`. Tool responses win over raw calls since they
/// carry the normalised arguments.
pub fn extract_tool_payload(parts: &[ResponsePart], tool: &str) -> Option<Value> {
    let response = parts.iter().rev().find_map(|p| match p {
        ResponsePart::ToolResponse { .. } => p.tool_payload(tool),
        _ => None,
    });
    response.or_else(|| {
        parts.iter().rev().find_map(|p| match p {
            ResponsePart::ToolCall { .. } => p.tool_payload(tool),
            _ => None,
        })
    })
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ResponsePart>, BackendError>;
}

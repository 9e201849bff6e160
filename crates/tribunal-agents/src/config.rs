use anyhow::{bail, Result};
use serde::Deserialize;

use coordination::config::TrialConfig;

pub const ENV_BASE_URL: &str = "TRIBUNAL_BASE_URL";
pub const ENV_MODEL: &str = "TRIBUNAL_MODEL";
/// Checked in order; the first non-empty value wins.
pub const API_KEY_VARS: &[&str] = &["TRIBUNAL_API_KEY", "GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// OpenAI-compatible inference endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    /// Sampling temperature for the research agents' query generation.
    pub research_temperature: f64,
    /// Sampling temperature for the arbiter.
    pub arbiter_temperature: f64,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Fails when no API key is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(api_key) = API_KEY_VARS.iter().find_map(|k| get(*k)) else {
            bail!(
                "no API key configured; set one of {}",
                API_KEY_VARS.join(", ")
            );
        };

        Ok(Self {
            base_url: get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            model: get(ENV_MODEL)
                .or_else(|| get("MODEL"))
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_key,
            research_temperature: 0.7,
            arbiter_temperature: 0.2,
        })
    }
}

/// Everything the binary needs to run a trial.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub trial: TrialConfig,
    pub backend: BackendConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            trial: TrialConfig::from_env(),
            backend: BackendConfig::from_env()?,
        })
    }
}

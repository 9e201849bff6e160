//! Trial configuration, built once at startup and passed to every component.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

pub const ENV_MAX_ROUNDS: &str = "TRIBUNAL_MAX_ROUNDS";
pub const ENV_OUTPUT_DIR: &str = "TRIBUNAL_OUTPUT_DIR";
pub const ENV_PARALLEL: &str = "TRIBUNAL_PARALLEL";
pub const ENV_MAX_RESULTS: &str = "TRIBUNAL_MAX_RESULTS";
pub const ENV_SUMMARY_CHARS_MAX: &str = "TRIBUNAL_SUMMARY_CHARS_MAX";
pub const ENV_EVIDENCE_ITEM_CHARS: &str = "TRIBUNAL_EVIDENCE_ITEM_CHARS";
pub const ENV_EVIDENCE_TOTAL_CHARS: &str = "TRIBUNAL_EVIDENCE_TOTAL_CHARS";
pub const ENV_QUERY_RETRIES: &str = "TRIBUNAL_QUERY_RETRIES";
pub const ENV_QUERY_RETRY_BASE: &str = "TRIBUNAL_QUERY_RETRY_BASE_SECONDS";
pub const ENV_ARBITER_RETRIES: &str = "TRIBUNAL_ARBITER_RETRIES";
pub const ENV_ARBITER_RETRY_BASE: &str = "TRIBUNAL_ARBITER_RETRY_BASE_SECONDS";
pub const ENV_RETRY_MAX_DELAY: &str = "TRIBUNAL_RETRY_MAX_DELAY_SECONDS";
pub const ENV_EXPOSE_ERRORS: &str = "TRIBUNAL_EXPOSE_ERRORS";
pub const ENV_WEB_FALLBACK_POSITIVE: &str = "TRIBUNAL_WEB_FALLBACK_POSITIVE";
pub const ENV_WEB_FALLBACK_NEGATIVE: &str = "TRIBUNAL_WEB_FALLBACK_NEGATIVE";
pub const ENV_MAX_TOOL_TURNS: &str = "TRIBUNAL_MAX_TOOL_TURNS";

pub const DEFAULT_MAX_ROUNDS: u32 = 3;
pub const DEFAULT_MAX_RESULTS: usize = 2;
pub const MAX_RESULTS_CAP: usize = 5;
pub const DEFAULT_SUMMARY_CHARS_MAX: usize = 1_400;
const SUMMARY_CHARS_RANGE: (usize, usize) = (200, 400_000);
pub const DEFAULT_EVIDENCE_ITEM_CHARS: usize = 1_500;
pub const DEFAULT_EVIDENCE_TOTAL_CHARS: usize = 6_000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_SECS: f64 = 1.5;
const DEFAULT_RETRY_MAX_DELAY_SECS: f64 = 20.0;
const DEFAULT_MAX_TOOL_TURNS: usize = 2;

/// Every tunable of a trial run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    pub max_rounds: u32,
    pub output_dir: PathBuf,
    /// Run the two research agents concurrently.
    pub parallel_research: bool,
    /// Primary-source results requested per query, in `1..=MAX_RESULTS_CAP`.
    pub max_results: usize,
    /// Per-article summary bound.
    pub summary_chars_max: usize,
    /// Per-item bound in the arbiter prompt.
    pub evidence_item_chars: usize,
    /// Whole-list bound in the arbiter prompt.
    pub evidence_total_chars: usize,
    pub query_retry: RetryPolicy,
    pub arbiter_retry: RetryPolicy,
    /// Include raw error text in arbiter-failure feedback.
    pub expose_error_details: bool,
    pub web_fallback_positive: bool,
    pub web_fallback_negative: bool,
    /// Tool-call turns the arbiter may take per deliberation.
    pub max_tool_turns: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        let retry = RetryPolicy::new(
            DEFAULT_RETRY_ATTEMPTS,
            Duration::from_secs_f64(DEFAULT_RETRY_BASE_SECS),
        )
        .with_max_delay(Duration::from_secs_f64(DEFAULT_RETRY_MAX_DELAY_SECS));
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            output_dir: PathBuf::from("output"),
            parallel_research: false,
            max_results: DEFAULT_MAX_RESULTS,
            summary_chars_max: DEFAULT_SUMMARY_CHARS_MAX,
            evidence_item_chars: DEFAULT_EVIDENCE_ITEM_CHARS,
            evidence_total_chars: DEFAULT_EVIDENCE_TOTAL_CHARS,
            query_retry: retry.clone(),
            arbiter_retry: retry,
            expose_error_details: false,
            web_fallback_positive: false,
            web_fallback_negative: true,
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|v| Duration::try_from_secs_f64(v).ok())
}

impl TrialConfig {
    /// Build from process environment variables, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let num = |key: &str| get(key).and_then(|v| v.parse::<usize>().ok());
        let flag = |key: &str, default: bool| get(key).and_then(|v| parse_flag(&v)).unwrap_or(default);

        let max_delay = get(ENV_RETRY_MAX_DELAY)
            .and_then(|v| parse_secs(&v))
            .unwrap_or(Duration::from_millis(d.query_retry.max_delay_ms));
        let retry = |attempts_key: &str, base_key: &str| {
            let attempts = get(attempts_key)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_RETRY_ATTEMPTS);
            let base = get(base_key)
                .and_then(|v| parse_secs(&v))
                .unwrap_or(Duration::from_secs_f64(DEFAULT_RETRY_BASE_SECS));
            RetryPolicy::new(attempts, base).with_max_delay(max_delay)
        };

        Self {
            max_rounds: get(ENV_MAX_ROUNDS)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v >= 1)
                .unwrap_or(d.max_rounds),
            output_dir: get(ENV_OUTPUT_DIR).map(PathBuf::from).unwrap_or(d.output_dir),
            parallel_research: flag(ENV_PARALLEL, d.parallel_research),
            max_results: num(ENV_MAX_RESULTS)
                .unwrap_or(d.max_results)
                .clamp(1, MAX_RESULTS_CAP),
            summary_chars_max: num(ENV_SUMMARY_CHARS_MAX)
                .map(|v| v.clamp(SUMMARY_CHARS_RANGE.0, SUMMARY_CHARS_RANGE.1))
                .unwrap_or(d.summary_chars_max),
            evidence_item_chars: num(ENV_EVIDENCE_ITEM_CHARS)
                .filter(|v| *v > 0)
                .unwrap_or(d.evidence_item_chars),
            evidence_total_chars: num(ENV_EVIDENCE_TOTAL_CHARS)
                .filter(|v| *v > 0)
                .unwrap_or(d.evidence_total_chars),
            query_retry: retry(ENV_QUERY_RETRIES, ENV_QUERY_RETRY_BASE),
            arbiter_retry: retry(ENV_ARBITER_RETRIES, ENV_ARBITER_RETRY_BASE),
            expose_error_details: flag(ENV_EXPOSE_ERRORS, d.expose_error_details),
            web_fallback_positive: flag(ENV_WEB_FALLBACK_POSITIVE, d.web_fallback_positive),
            web_fallback_negative: flag(ENV_WEB_FALLBACK_NEGATIVE, d.web_fallback_negative),
            max_tool_turns: num(ENV_MAX_TOOL_TURNS)
                .filter(|v| *v > 0)
                .unwrap_or(d.max_tool_turns),
        }
    }

    /// Whether research for `side` may fall back to web search.
    pub fn web_fallback(&self, side: crate::trial::Side) -> bool {
        match side {
            crate::trial::Side::Positive => self.web_fallback_positive,
            crate::trial::Side::Negative => self.web_fallback_negative,
        }
    }
}

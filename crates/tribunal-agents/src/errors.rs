//! Error taxonomy for backend and knowledge-source calls, with retry
//! classification.
//!
//! | Category   | Retriable | Handling                         |
//! |------------|-----------|----------------------------------|
//! | RateLimit  | yes       | capped exponential backoff       |
//! | Terminal   | no        | fall through to the caller's fallback |

use std::future::Future;

use coordination::retry::RetryPolicy;
use thiserror::Error;
use tracing::warn;

/// Markers that identify resource exhaustion anywhere in an error chain.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "resource_exhausted",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// API rate limit; retry with exponential backoff.
    RateLimit,
    /// Anything else; do not retry.
    Terminal,
}

impl RetryCategory {
    pub fn is_retriable(self) -> bool {
        matches!(self, Self::RateLimit)
    }
}

impl std::fmt::Display for RetryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

/// Failure of a text-generation backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

impl BackendError {
    pub fn retry_category(&self) -> RetryCategory {
        match self {
            Self::RateLimited(_) => RetryCategory::RateLimit,
            _ => RetryCategory::Terminal,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.retry_category() == RetryCategory::RateLimit
    }

    /// Classify an arbitrary error, walking its `source()` chain for
    /// rate-limit signals.
    pub fn classify(err: &(dyn std::error::Error + 'static)) -> Self {
        if is_rate_limit_error(err) {
            Self::RateLimited(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

fn has_rate_limit_marker(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Whether `err` or any error in its cause chain signals rate limiting.
pub fn is_rate_limit_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if has_rate_limit_marker(&e.to_string()) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Failure of a knowledge-source lookup.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Run `op` under `policy`, retrying only rate-limit failures.
///
/// Any other error returns immediately. Exhausting attempts returns the
/// last rate-limit error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.retry_category().is_retriable() && policy.should_retry(attempt) => {
                let backoff = policy.backoff_duration(attempt);
                warn!(
                    label,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Rate limited, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//! Retry policy for rate-limited backend calls.
//!
//! Attempts are bounded and each delay is capped, so a single failing call
//! can stall a round for at most `max_attempts - 1` capped sleeps.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Exponential backoff with jitter and a per-delay cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff multiplier (2.0 for doubling).
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Extra random delay as a fraction of the computed delay (0.0 disables).
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Deterministic delay after failed attempt `attempt` (0-indexed):
    /// `base × multiplier^attempt`, capped.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }

    /// Whether another attempt is allowed after `attempt` (0-indexed) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Backoff with jitter applied, still capped at `max_delay_ms`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.backoff_ms(attempt);
        let spread = (base as f64 * self.jitter) as u64;
        let extra = if spread > 0 {
            rand::rng().random_range(0..=spread)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(extra).min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 1.5s base, doubling, 20s cap, 25% jitter.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_500,
            backoff_multiplier: 2.0,
            max_delay_ms: 20_000,
            jitter: 0.25,
        }
    }
}

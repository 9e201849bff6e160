//! Deterministic core of the research tribunal.
//!
//! - [`trial`]: trial state machine, arbiter decisions, verdict artifact
//! - [`retrieval`]: parsing and on-topic filtering of knowledge-source results
//! - [`retry`]: capped exponential backoff for rate-limited calls
//! - [`config`]: the single configuration struct every component receives
//!
//! Nothing here touches the network or an async runtime.

pub mod config;
pub mod retrieval;
pub mod retry;
pub mod trial;

pub use config::TrialConfig;
pub use retry::RetryPolicy;
pub use trial::{Decision, Side, TrialError, TrialState, TrialStatus};

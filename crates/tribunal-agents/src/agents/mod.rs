//! Tribunal roles.
//!
//! Two mirrored research agents gather evidence for opposite sides and the
//! arbiter decides whether the trial can close. All three talk to the model
//! only through [`GenerationBackend`](crate::backend::GenerationBackend).

pub mod arbiter;
pub mod query;
pub mod researcher;

pub use arbiter::Arbiter;
pub use query::{QueryGenerator, QueryOrigin};
pub use researcher::{Evidence, ResearchAgent, ResearchFindings, ResearchProfile, ADVOCATE, SKEPTIC};

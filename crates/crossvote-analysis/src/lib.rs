//! Ecological inference engine.
//!
//! Estimates how voters in each row category (one contest's choices) split
//! across column categories (another contest's choices) from precinct-level
//! marginal shares only.
//!
//! Data flows left to right:
//! preparation → model → sampler → diagnostics → summary, tied together by
//! [`pipeline::EcologicalInference`].

pub mod diagnostics;
pub mod model;
pub mod pipeline;
pub mod preparation;
pub mod sampler;
pub mod summary;

pub use pipeline::{EcologicalInference, InferenceOutcome};

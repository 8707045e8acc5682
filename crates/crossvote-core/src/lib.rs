//! Core types, errors, configuration, tracing, and cancellation for crossvote.

pub mod config;
pub mod constants;
pub mod errors;
pub mod traits;
pub mod tracing;
pub mod types;

pub use config::CrossvoteConfig;
pub use errors::{
    ConfigError, CrossvoteErrorCode, DiagnosticsError, InputError, PipelineError,
    SamplerError,
};
pub use traits::{Cancellable, CancellationToken};
pub use types::{CategorySet, Precinct, PrecinctSet};

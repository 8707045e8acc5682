//! Error handling for crossvote.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod config_error;
pub mod diagnostics_error;
pub mod error_code;
pub mod input_error;
pub mod pipeline_error;
pub mod sampler_error;

pub use config_error::ConfigError;
pub use diagnostics_error::DiagnosticsError;
pub use error_code::CrossvoteErrorCode;
pub use input_error::InputError;
pub use pipeline_error::PipelineError;
pub use sampler_error::SamplerError;

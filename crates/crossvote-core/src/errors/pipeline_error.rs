//! Pipeline errors.

use super::error_code::{self, CrossvoteErrorCode};
use super::{ConfigError, DiagnosticsError, InputError, SamplerError};

/// Errors that can occur during an inference run.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Sampler error: {0}")]
    Sampler(#[from] SamplerError),

    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] DiagnosticsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run cancelled after {completed_draws} of {requested_draws} retained draws; partial output discarded")]
    Cancelled {
        completed_draws: usize,
        requested_draws: usize,
    },
}

impl CrossvoteErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Input(e) => e.error_code(),
            Self::Sampler(e) => e.error_code(),
            Self::Diagnostics(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Cancelled { .. } => error_code::CANCELLED,
        }
    }
}

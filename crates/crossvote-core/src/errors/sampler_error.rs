//! Sampler errors.

use super::error_code::{self, CrossvoteErrorCode};

/// Errors raised by the posterior sampler.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error(
        "Divergence rate {rate:.4} exceeds limit {limit:.4} \
         ({divergent} of {total} draws, {precincts} precincts, {rows}x{columns} categories)"
    )]
    Divergence {
        divergent: usize,
        total: usize,
        rate: f64,
        limit: f64,
        precincts: usize,
        rows: usize,
        columns: usize,
    },

    #[error("Invalid sampler settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to build sampler thread pool: {0}")]
    ThreadPool(String),
}

impl CrossvoteErrorCode for SamplerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Divergence { .. } => error_code::SAMPLER_DIVERGENCE,
            Self::InvalidSettings(_) | Self::ThreadPool(_) => error_code::SAMPLER_ERROR,
        }
    }
}

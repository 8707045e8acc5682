//! Convergence diagnostics errors.

use super::error_code::{self, CrossvoteErrorCode};

/// Errors raised while certifying sampler output.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error(
        "{failing} of {monitored} parameters failed convergence \
         (max R-hat {max_rhat:.4} on {worst_parameter}, threshold {threshold:.4}, min ESS {min_ess:.1})"
    )]
    NonConvergence {
        failing: usize,
        monitored: usize,
        max_rhat: f64,
        worst_parameter: String,
        threshold: f64,
        min_ess: f64,
    },

    #[error("At least {required} chains are required, got {found}")]
    InsufficientChains { required: usize, found: usize },

    #[error("At least {required} draws per chain are required, got {found}")]
    InsufficientDraws { required: usize, found: usize },

    #[error("Chains have unequal lengths ({shortest} to {longest} draws)")]
    RaggedChains { shortest: usize, longest: usize },
}

impl CrossvoteErrorCode for DiagnosticsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NonConvergence { .. } => error_code::NON_CONVERGENCE,
            _ => error_code::DIAGNOSTICS_ERROR,
        }
    }
}

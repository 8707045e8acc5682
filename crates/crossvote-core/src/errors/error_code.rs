//! Stable error codes for callers that branch on failure kind.

/// Every error enum implements this to expose a structured code string
/// that stays stable across message rewording.
pub trait CrossvoteErrorCode {
    /// Returns the error code string (e.g., "EMPTY_DATASET").
    fn error_code(&self) -> &'static str;

    /// Returns `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const EMPTY_DATASET: &str = "EMPTY_DATASET";
pub const DEGENERATE_INPUT: &str = "DEGENERATE_INPUT";
pub const DIMENSION_MISMATCH: &str = "DIMENSION_MISMATCH";
pub const INVALID_CATEGORIES: &str = "INVALID_CATEGORIES";
pub const SAMPLER_DIVERGENCE: &str = "SAMPLER_DIVERGENCE";
pub const SAMPLER_ERROR: &str = "SAMPLER_ERROR";
pub const NON_CONVERGENCE: &str = "NON_CONVERGENCE";
pub const DIAGNOSTICS_ERROR: &str = "DIAGNOSTICS_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const CANCELLED: &str = "CANCELLED";

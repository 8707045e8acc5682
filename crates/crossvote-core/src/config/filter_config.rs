//! Precinct filter configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SHARE_TOLERANCE;

/// What to do with a precinct whose shares are non-finite, negative, or of
/// the wrong width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Drop the precinct and record why.
    #[default]
    Exclude,
    /// Abort with `InputError::DegenerateInput`.
    Reject,
}

/// Configuration for the precinct filter.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Allowed deviation of a share vector's sum from 1. Default: 1e-6.
    pub share_tolerance: Option<f64>,
    /// Degenerate precinct handling. Default: exclude.
    pub degenerate_policy: Option<DegeneratePolicy>,
}

impl FilterConfig {
    pub fn effective_share_tolerance(&self) -> f64 {
        self.share_tolerance.unwrap_or(DEFAULT_SHARE_TOLERANCE)
    }

    pub fn effective_degenerate_policy(&self) -> DegeneratePolicy {
        self.degenerate_policy.unwrap_or_default()
    }
}

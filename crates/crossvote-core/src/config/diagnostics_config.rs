//! Convergence diagnostics configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RHAT_THRESHOLD;

/// Configuration for convergence gating.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Split R-hat above this fails a parameter. Default: 1.05.
    pub rhat_threshold: Option<f64>,
    /// Minimum effective sample size per parameter (None = not gated).
    pub min_ess: Option<f64>,
    /// Also monitor log concentrations. Default: false.
    pub monitor_concentration: Option<bool>,
    /// Return a non-converged estimate (with a warning) instead of failing.
    /// Default: false.
    pub allow_non_converged: Option<bool>,
}

impl DiagnosticsConfig {
    pub fn effective_rhat_threshold(&self) -> f64 {
        self.rhat_threshold.unwrap_or(DEFAULT_RHAT_THRESHOLD)
    }

    pub fn effective_monitor_concentration(&self) -> bool {
        self.monitor_concentration.unwrap_or(false)
    }

    pub fn effective_allow_non_converged(&self) -> bool {
        self.allow_non_converged.unwrap_or(false)
    }
}

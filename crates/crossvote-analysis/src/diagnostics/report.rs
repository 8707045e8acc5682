//! Convergence report.

use serde::{Deserialize, Serialize};

use crossvote_core::errors::DiagnosticsError;

/// Diagnostics for one monitored scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDiagnostic {
    pub name: String,
    pub rhat: f64,
    pub ess: f64,
    pub passed: bool,
}

/// Diagnostics for every monitored parameter plus the overall verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    pub parameters: Vec<ParameterDiagnostic>,
    pub rhat_threshold: f64,
    pub min_ess: Option<f64>,
    pub chains: usize,
    pub draws_per_chain: usize,
    pub passed: bool,
}

impl ConvergenceReport {
    pub(crate) fn new(
        parameters: Vec<ParameterDiagnostic>,
        rhat_threshold: f64,
        min_ess: Option<f64>,
        chains: usize,
        draws_per_chain: usize,
    ) -> Self {
        let passed = parameters.iter().all(|p| p.passed);
        Self {
            parameters,
            rhat_threshold,
            min_ess,
            chains,
            draws_per_chain,
            passed,
        }
    }

    /// Largest R-hat. NaN counts as worse than anything finite.
    pub fn max_rhat(&self) -> f64 {
        self.worst().map(|p| p.rhat).unwrap_or(1.0)
    }

    /// Parameter with the largest R-hat.
    pub fn worst(&self) -> Option<&ParameterDiagnostic> {
        self.parameters.iter().max_by(|a, b| {
            let key = |r: f64| if r.is_nan() { f64::INFINITY } else { r };
            key(a.rhat).total_cmp(&key(b.rhat))
        })
    }

    /// Smallest effective sample size.
    pub fn min_observed_ess(&self) -> f64 {
        self.parameters
            .iter()
            .map(|p| p.ess)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn failing(&self) -> impl Iterator<Item = &ParameterDiagnostic> {
        self.parameters.iter().filter(|p| !p.passed)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDiagnostic> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// `Ok` if every parameter passed, otherwise a `NonConvergence` error
    /// naming the worst offender.
    pub fn require_converged(&self) -> Result<(), DiagnosticsError> {
        if self.passed {
            return Ok(());
        }
        Err(DiagnosticsError::NonConvergence {
            failing: self.failing().count(),
            monitored: self.parameters.len(),
            max_rhat: self.max_rhat(),
            worst_parameter: self.worst().map(|p| p.name.clone()).unwrap_or_default(),
            threshold: self.rhat_threshold,
            min_ess: self.min_observed_ess(),
        })
    }
}

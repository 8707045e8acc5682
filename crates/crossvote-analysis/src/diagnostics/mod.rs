//! Convergence diagnostics: split R-hat and effective sample size for
//! every monitored scalar, gated against configured thresholds.

pub mod ess;
pub mod report;
pub mod rhat;

use rayon::prelude::*;

use crossvote_core::config::DiagnosticsConfig;
use crossvote_core::constants::MIN_DRAWS_FOR_DIAGNOSTICS;
use crossvote_core::errors::DiagnosticsError;

use crate::sampler::{ParameterSeries, SamplerRun};

pub use ess::effective_sample_size;
pub use report::{ConvergenceReport, ParameterDiagnostic};
pub use rhat::split_rhat;

/// Minimum number of chains for between-chain comparison.
pub const MIN_CHAINS: usize = 2;

/// Certifies sampler output.
#[derive(Debug, Clone)]
pub struct ConvergenceDiagnostics {
    rhat_threshold: f64,
    min_ess: Option<f64>,
    monitor_concentration: bool,
}

impl Default for ConvergenceDiagnostics {
    fn default() -> Self {
        Self::from_config(&DiagnosticsConfig::default())
    }
}

impl ConvergenceDiagnostics {
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self {
            rhat_threshold: config.effective_rhat_threshold(),
            min_ess: config.min_ess,
            monitor_concentration: config.effective_monitor_concentration(),
        }
    }

    pub fn rhat_threshold(&self) -> f64 {
        self.rhat_threshold
    }

    /// Diagnose every monitored parameter of a run.
    ///
    /// Errors only when the run's shape rules diagnostics out; a run that
    /// fails the thresholds still yields a report with `passed == false`.
    pub fn evaluate(&self, run: &SamplerRun) -> Result<ConvergenceReport, DiagnosticsError> {
        self.evaluate_series(&run.monitored_parameters(self.monitor_concentration))
    }

    /// Diagnose arbitrary per-chain series.
    pub fn evaluate_series(
        &self,
        series: &[ParameterSeries],
    ) -> Result<ConvergenceReport, DiagnosticsError> {
        let (chains, draws) = match series.first() {
            Some(first) => check_shape(&first.chains)?,
            None => (0, 0),
        };
        for s in series.iter().skip(1) {
            check_shape(&s.chains)?;
        }

        let parameters: Vec<ParameterDiagnostic> = series
            .par_iter()
            .map(|s| {
                let rhat = split_rhat(&s.chains);
                let ess = effective_sample_size(&s.chains);
                let passed = rhat.is_finite()
                    && rhat <= self.rhat_threshold
                    && self.min_ess.map_or(true, |min| ess >= min);
                ParameterDiagnostic {
                    name: s.name.clone(),
                    rhat,
                    ess,
                    passed,
                }
            })
            .collect();

        let report =
            ConvergenceReport::new(parameters, self.rhat_threshold, self.min_ess, chains, draws);
        if report.passed {
            tracing::info!(
                monitored = report.parameters.len(),
                max_rhat = report.max_rhat(),
                min_ess = report.min_observed_ess(),
                "convergence diagnostics passed"
            );
        } else {
            tracing::debug!(
                failing = report.failing().count(),
                monitored = report.parameters.len(),
                max_rhat = report.max_rhat(),
                "convergence diagnostics failed"
            );
        }
        Ok(report)
    }
}

/// Chain count and per-chain length, if the series is usable.
fn check_shape(chains: &[Vec<f64>]) -> Result<(usize, usize), DiagnosticsError> {
    if chains.len() < MIN_CHAINS {
        return Err(DiagnosticsError::InsufficientChains {
            required: MIN_CHAINS,
            found: chains.len(),
        });
    }
    let shortest = chains.iter().map(Vec::len).min().unwrap_or(0);
    let longest = chains.iter().map(Vec::len).max().unwrap_or(0);
    if shortest != longest {
        return Err(DiagnosticsError::RaggedChains { shortest, longest });
    }
    if shortest < MIN_DRAWS_FOR_DIAGNOSTICS {
        return Err(DiagnosticsError::InsufficientDraws {
            required: MIN_DRAWS_FOR_DIAGNOSTICS,
            found: shortest,
        });
    }
    Ok((chains.len(), shortest))
}

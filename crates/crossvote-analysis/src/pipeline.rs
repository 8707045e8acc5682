//! End-to-end inference: filter → model → sampler → gates → summaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crossvote_core::config::EstimateLevel;
use crossvote_core::errors::{InputError, PipelineError};
use crossvote_core::traits::CancellationToken;
use crossvote_core::types::{CategorySet, PrecinctSet};
use crossvote_core::CrossvoteConfig;

use crate::diagnostics::{ConvergenceDiagnostics, ConvergenceReport};
use crate::model::HierarchicalModel;
use crate::preparation::{FilterReport, KeyedAggregate, PrecinctFilter, ShareTable};
use crate::sampler::{Sampler, SamplerRun, SamplerSettings};
use crate::summary::{PosteriorEstimate, PosteriorSummarizer, PrecinctPreference};

/// Divergent-draw accounting for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceSummary {
    pub divergent: usize,
    pub total: usize,
    pub rate: f64,
    pub limit: f64,
    pub warmup_divergences: usize,
}

/// Result of a successful inference run.
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    /// Estimate at the configured level.
    pub estimate: PosteriorEstimate,
    /// Estimate of the typical preference vectors.
    pub global: PosteriorEstimate,
    /// Posterior mean matrix per precinct, in dataset order.
    pub precincts: Vec<PrecinctPreference>,
    /// `None` only when diagnostics could not run and non-converged output
    /// was explicitly allowed.
    pub convergence: Option<ConvergenceReport>,
    pub divergence: DivergenceSummary,
    pub converged: bool,
    pub run: SamplerRun,
    summarizer: PosteriorSummarizer,
}

impl InferenceOutcome {
    /// Re-summarize the same draws at another level.
    pub fn estimate_at(&self, level: EstimateLevel) -> Result<PosteriorEstimate, InputError> {
        self.summarizer
            .summarize(&self.run, level, &self.estimate.rows, &self.estimate.columns)
    }

    /// Posterior probability that voters in `row_a` chose `column` more
    /// often than voters in `row_b`, by more than `threshold`, at the
    /// estimate's level.
    pub fn preference_gap_probability(
        &self,
        row_a: &str,
        row_b: &str,
        column: &str,
        threshold: f64,
    ) -> Result<f64, InputError> {
        let lookup = |set: &CategorySet, label: &str| {
            set.index_of(label).ok_or_else(|| InputError::InvalidCategories {
                message: format!("unknown label '{label}'"),
            })
        };
        let a = lookup(&self.estimate.rows, row_a)?;
        let b = lookup(&self.estimate.rows, row_b)?;
        let c = lookup(&self.estimate.columns, column)?;
        self.summarizer
            .preference_gap_probability(&self.run, self.estimate.level, a, b, c, threshold)
    }
}

/// The ecological inference engine.
#[derive(Debug, Clone, Default)]
pub struct EcologicalInference {
    config: CrossvoteConfig,
}

impl EcologicalInference {
    pub fn new(config: CrossvoteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CrossvoteConfig {
        &self.config
    }

    /// Join and filter raw sources into a dataset.
    pub fn prepare(
        &self,
        populations: &KeyedAggregate<u64>,
        rows: &ShareTable,
        columns: &ShareTable,
    ) -> Result<(PrecinctSet, FilterReport), PipelineError> {
        Ok(PrecinctFilter::from_config(&self.config.filter).apply(populations, rows, columns)?)
    }

    /// Filter raw sources, then fit.
    pub fn run(
        &self,
        populations: &KeyedAggregate<u64>,
        rows: &ShareTable,
        columns: &ShareTable,
        token: &CancellationToken,
    ) -> Result<(InferenceOutcome, FilterReport), PipelineError> {
        let (data, report) = self.prepare(populations, rows, columns)?;
        let outcome = self.fit(&data, token)?;
        Ok((outcome, report))
    }

    /// Sample the posterior for `data` and summarize it.
    ///
    /// Fails on invalid configuration, label/data dimension mismatch,
    /// sampler errors, a divergence rate above the limit, cancellation, and
    /// (unless `allow_non_converged` is set) failed convergence.
    pub fn fit(
        &self,
        data: &PrecinctSet,
        token: &CancellationToken,
    ) -> Result<InferenceOutcome, PipelineError> {
        let config = &self.config;
        CrossvoteConfig::validate(config)?;
        let (row_labels, column_labels) = self.labels(data)?;

        let model = HierarchicalModel::new(data, &config.model);
        let token = match config.sampler.time_budget_secs {
            Some(secs) => token.child_with_budget(Duration::from_secs(secs)),
            None => token.clone(),
        };
        let settings = SamplerSettings::from_config(&config.sampler);
        let run = Sampler::new(&model, settings).run(&token)?;

        if run.is_cancelled() {
            return Err(PipelineError::Cancelled {
                completed_draws: run.completed_draws(),
                requested_draws: run.requested_draws,
            });
        }

        let limit = config.sampler.effective_max_divergence_rate();
        run.check_divergence(limit)?;
        let divergence = DivergenceSummary {
            divergent: run.divergent_draws(),
            total: run.total_draws(),
            rate: run.divergence_rate(),
            limit,
            warmup_divergences: run.chains.iter().map(|c| c.warmup_divergences).sum(),
        };

        let allow = config.diagnostics.effective_allow_non_converged();
        let (convergence, converged) =
            match ConvergenceDiagnostics::from_config(&config.diagnostics).evaluate(&run) {
                Ok(report) if report.passed => (Some(report), true),
                Ok(report) => {
                    if !allow {
                        report.require_converged()?;
                    }
                    tracing::warn!(
                        failing = report.failing().count(),
                        max_rhat = report.max_rhat(),
                        "returning estimate that failed convergence diagnostics"
                    );
                    (Some(report), false)
                }
                Err(e) if allow => {
                    tracing::warn!(error = %e, "convergence diagnostics unavailable");
                    (None, false)
                }
                Err(e) => return Err(e.into()),
            };

        let summarizer = PosteriorSummarizer::from_config(&config.summary);
        let level = config.summary.effective_level();
        let estimate = summarizer.summarize(&run, level, &row_labels, &column_labels)?;
        let global =
            summarizer.summarize(&run, EstimateLevel::Global, &row_labels, &column_labels)?;
        let precincts = summarizer.precinct_preferences(&run, data)?;

        tracing::info!(
            precincts = data.len(),
            rows = data.rows(),
            columns = data.columns(),
            %level,
            converged,
            "inference complete"
        );

        Ok(InferenceOutcome {
            estimate,
            global,
            precincts,
            convergence,
            divergence,
            converged,
            run,
            summarizer,
        })
    }

    /// Configured labels, or positional ones when none are configured.
    fn labels(&self, data: &PrecinctSet) -> Result<(CategorySet, CategorySet), InputError> {
        let categories = &self.config.categories;
        let rows = match categories.row_set()? {
            Some(set) => set,
            None => CategorySet::positional("row ", data.rows())?,
        };
        let columns = match categories.column_set()? {
            Some(set) => set,
            None => CategorySet::positional("column ", data.columns())?,
        };
        if rows.len() != data.rows() {
            return Err(InputError::DimensionMismatch {
                what: "row labels",
                expected: data.rows(),
                found: rows.len(),
            });
        }
        if columns.len() != data.columns() {
            return Err(InputError::DimensionMismatch {
                what: "column labels",
                expected: data.columns(),
                found: columns.len(),
            });
        }
        Ok((rows, columns))
    }
}

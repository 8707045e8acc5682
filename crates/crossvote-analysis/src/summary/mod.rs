//! Posterior summaries: reduce retained draws to labeled point estimates,
//! credible intervals and posterior probabilities.

pub mod estimate;

use crossvote_core::config::{EstimateLevel, SummaryConfig};
use crossvote_core::errors::InputError;
use crossvote_core::types::{CategorySet, PrecinctSet};

use crate::sampler::SamplerRun;

pub use estimate::{CellEstimate, PosteriorEstimate, PrecinctPreference};

/// Row sums of a posterior mean must stay within this of 1.
const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Turns sampler output into estimates.
#[derive(Debug, Clone)]
pub struct PosteriorSummarizer {
    credible_level: f64,
}

impl Default for PosteriorSummarizer {
    fn default() -> Self {
        Self::from_config(&SummaryConfig::default())
    }
}

impl PosteriorSummarizer {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            credible_level: config.effective_credible_level(),
        }
    }

    pub fn credible_level(&self) -> f64 {
        self.credible_level
    }

    /// Posterior mean and equal-tailed credible interval of every cell at
    /// `level`, pooled over all chains.
    ///
    /// Fails with `DimensionMismatch` when the labels do not fit the run.
    pub fn summarize(
        &self,
        run: &SamplerRun,
        level: EstimateLevel,
        rows: &CategorySet,
        columns: &CategorySet,
    ) -> Result<PosteriorEstimate, InputError> {
        check_labels(run, rows, columns)?;
        let cells = run.rows * run.columns;
        let draws = run.total_draws();

        let mut mean = vec![0.0; cells];
        let mut lower = vec![0.0; cells];
        let mut upper = vec![0.0; cells];
        let tail = (1.0 - self.credible_level) / 2.0;
        let mut values = Vec::with_capacity(draws);
        for i in 0..cells {
            values.clear();
            values.extend(run.draws().map(|d| d.matrix(level)[i]));
            if values.is_empty() {
                continue;
            }
            mean[i] = values.iter().sum::<f64>() / values.len() as f64;
            values.sort_by(f64::total_cmp);
            lower[i] = quantile_sorted(&values, tail);
            upper[i] = quantile_sorted(&values, 1.0 - tail);
        }

        for row in mean.chunks(run.columns) {
            let sum: f64 = row.iter().sum();
            debug_assert!(
                draws == 0 || (sum - 1.0).abs() < ROW_SUM_TOLERANCE,
                "posterior mean row sums to {sum}"
            );
        }

        Ok(PosteriorEstimate {
            level,
            rows: rows.clone(),
            columns: columns.clone(),
            mean,
            lower,
            upper,
            credible_level: self.credible_level,
            draws,
        })
    }

    /// Posterior mean preference matrix of every precinct, in dataset order.
    pub fn precinct_preferences(
        &self,
        run: &SamplerRun,
        data: &PrecinctSet,
    ) -> Result<Vec<PrecinctPreference>, InputError> {
        if data.len() != run.precincts {
            return Err(InputError::DimensionMismatch {
                what: "precinct count",
                expected: run.precincts,
                found: data.len(),
            });
        }
        let block = run.rows * run.columns;
        let means = run.precinct_means();
        Ok(data
            .precincts()
            .iter()
            .zip(means.chunks(block))
            .map(|(p, m)| PrecinctPreference {
                precinct: p.id.clone(),
                mean: m.to_vec(),
            })
            .collect())
    }

    /// Posterior probability that row `row_a` chooses `column` more often
    /// than row `row_b` does, by more than `threshold`, at `level`.
    pub fn preference_gap_probability(
        &self,
        run: &SamplerRun,
        level: EstimateLevel,
        row_a: usize,
        row_b: usize,
        column: usize,
        threshold: f64,
    ) -> Result<f64, InputError> {
        for (what, index, bound) in [
            ("row index", row_a, run.rows),
            ("row index", row_b, run.rows),
            ("column index", column, run.columns),
        ] {
            if index >= bound {
                return Err(InputError::DimensionMismatch {
                    what,
                    expected: bound,
                    found: index,
                });
            }
        }
        let total = run.total_draws();
        if total == 0 {
            return Ok(0.0);
        }
        let hits = run
            .draws()
            .filter(|d| {
                let m = d.matrix(level);
                m[row_a * run.columns + column] - m[row_b * run.columns + column] > threshold
            })
            .count();
        Ok(hits as f64 / total as f64)
    }
}

fn check_labels(
    run: &SamplerRun,
    rows: &CategorySet,
    columns: &CategorySet,
) -> Result<(), InputError> {
    if rows.len() != run.rows {
        return Err(InputError::DimensionMismatch {
            what: "row labels",
            expected: run.rows,
            found: rows.len(),
        });
    }
    if columns.len() != run.columns {
        return Err(InputError::DimensionMismatch {
            what: "column labels",
            expected: run.columns,
            found: columns.len(),
        });
    }
    Ok(())
}

/// Linear-interpolation quantile (Hyndman-Fan type 7) of sorted values.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

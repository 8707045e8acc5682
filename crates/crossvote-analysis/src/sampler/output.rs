//! Sampler output: retained draws per chain and run-level queries.

use serde::{Deserialize, Serialize};

use crossvote_core::config::EstimateLevel;
use crossvote_core::errors::SamplerError;

/// One retained draw. Matrices are row-major `[r * C + c]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    /// Typical preference vectors (global level).
    pub typical: Vec<f64>,
    /// `ln kappa_r` per row category.
    pub log_concentration: Vec<f64>,
    /// Unweighted mean of the precinct preference matrices.
    pub precinct_mean: Vec<f64>,
    /// Precinct matrices weighted by row-category population.
    pub district: Vec<f64>,
    /// Log target density in unconstrained coordinates.
    pub log_density: f64,
    /// The transition that produced this draw hit an energy error above
    /// the divergence threshold, or a non-finite one.
    pub divergent: bool,
}

impl Draw {
    /// The transition matrix this draw reports at `level`.
    pub fn matrix(&self, level: EstimateLevel) -> &[f64] {
        match level {
            EstimateLevel::Precinct => &self.precinct_mean,
            EstimateLevel::District => &self.district,
            EstimateLevel::Global => &self.typical,
        }
    }
}

/// Post-warm-up behaviour of one chain's Hamiltonian transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainStats {
    /// Step size fixed at the end of warm-up.
    pub step_size: f64,
    pub mean_accept_stat: f64,
    pub mean_tree_depth: f64,
    /// Transitions stopped by the tree depth limit rather than a U-turn.
    pub max_depth_hits: usize,
    /// Leapfrog steps, i.e. gradient evaluations.
    pub leapfrogs: usize,
}

/// Everything one chain produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainOutput {
    pub chain: usize,
    pub draws: Vec<Draw>,
    /// Sum over retained draws of every precinct preference, `[(p * R + r) * C + c]`.
    pub precinct_sums: Vec<f64>,
    pub stats: ChainStats,
    pub warmup_divergences: usize,
    /// Stopped early by its cancellation token.
    pub cancelled: bool,
}

impl ChainOutput {
    pub fn divergences(&self) -> usize {
        self.draws.iter().filter(|d| d.divergent).count()
    }
}

/// The draws of one monitored scalar across chains.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSeries {
    pub name: String,
    pub chains: Vec<Vec<f64>>,
}

/// Output of a full multi-chain run, chains in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerRun {
    pub rows: usize,
    pub columns: usize,
    pub precincts: usize,
    pub requested_draws: usize,
    pub chains: Vec<ChainOutput>,
}

impl SamplerRun {
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    pub fn divergent_draws(&self) -> usize {
        self.chains.iter().map(ChainOutput::divergences).sum()
    }

    /// Fraction of retained draws flagged divergent; 0 with no draws.
    pub fn divergence_rate(&self) -> f64 {
        let total = self.total_draws();
        if total == 0 {
            0.0
        } else {
            self.divergent_draws() as f64 / total as f64
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.chains.iter().any(|c| c.cancelled)
    }

    /// Retained draws completed by the slowest chain.
    pub fn completed_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).min().unwrap_or(0)
    }

    /// Fail when the divergence rate exceeds `limit`.
    pub fn check_divergence(&self, limit: f64) -> Result<(), SamplerError> {
        let rate = self.divergence_rate();
        if rate > limit {
            return Err(SamplerError::Divergence {
                divergent: self.divergent_draws(),
                total: self.total_draws(),
                rate,
                limit,
                precincts: self.precincts,
                rows: self.rows,
                columns: self.columns,
            });
        }
        Ok(())
    }

    /// Every retained draw across chains, in chain order.
    pub fn draws(&self) -> impl Iterator<Item = &Draw> {
        self.chains.iter().flat_map(|c| c.draws.iter())
    }

    /// Scalars watched by the convergence diagnostics: every cell of the
    /// global, precinct-mean and district matrices, plus each row's log
    /// concentration when `with_concentration` is set.
    pub fn monitored_parameters(&self, with_concentration: bool) -> Vec<ParameterSeries> {
        let cells = self.rows * self.columns;
        let mut out = Vec::with_capacity(3 * cells + self.rows);
        let matrices = [
            ("typical", EstimateLevel::Global),
            ("precinct_mean", EstimateLevel::Precinct),
            ("district", EstimateLevel::District),
        ];
        for (label, level) in matrices {
            for i in 0..cells {
                out.push(ParameterSeries {
                    name: format!("{label}[{},{}]", i / self.columns, i % self.columns),
                    chains: self
                        .chains
                        .iter()
                        .map(|c| c.draws.iter().map(|d| d.matrix(level)[i]).collect())
                        .collect(),
                });
            }
        }
        if with_concentration {
            for r in 0..self.rows {
                out.push(ParameterSeries {
                    name: format!("log_concentration[{r}]"),
                    chains: self
                        .chains
                        .iter()
                        .map(|c| c.draws.iter().map(|d| d.log_concentration[r]).collect())
                        .collect(),
                });
            }
        }
        out
    }

    /// Posterior mean of every precinct preference, `[(p * R + r) * C + c]`.
    pub fn precinct_means(&self) -> Vec<f64> {
        let len = self.precincts * self.rows * self.columns;
        let mut means = vec![0.0; len];
        for chain in &self.chains {
            for (m, s) in means.iter_mut().zip(&chain.precinct_sums) {
                *m += s;
            }
        }
        let total = self.total_draws();
        if total > 0 {
            means.iter_mut().for_each(|m| *m /= total as f64);
        }
        means
    }
}

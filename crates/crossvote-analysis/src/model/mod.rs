//! Hierarchical multinomial-Dirichlet preference model.
//!
//! For each row category `r`:
//!   typical vector `phi_r ~ Dirichlet(1, ..., 1)`,
//!   concentration `kappa_r ~ Gamma(shape, rate)`.
//! For each precinct `p`:
//!   `beta_pr ~ Dirichlet(kappa_r * phi_r)`,
//!   `theta_p = sum_r x_pr * beta_pr`,
//!   column counts `n_p ~ Multinomial(N_p, theta_p)`.
//!
//! The sampler works on unconstrained coordinates (ALR for every simplex,
//! log for every concentration); all densities here are expressed in those
//! coordinates, Jacobians included. [`density`] maps the sampler's flat
//! position vector onto this model and differentiates it.

pub mod density;
pub mod simplex;

use crossvote_core::config::ModelConfig;
use crossvote_core::types::PrecinctSet;
use statrs::function::gamma::ln_gamma;

/// Gamma prior on a row concentration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationPrior {
    pub shape: f64,
    pub rate: f64,
}

impl ConcentrationPrior {
    /// Log density of `ln kappa` (up to a constant), Jacobian included.
    pub fn log_density_of_log(&self, log_kappa: f64) -> f64 {
        self.shape * log_kappa - self.rate * log_kappa.exp()
    }

    /// Derivative of [`Self::log_density_of_log`].
    pub fn log_density_of_log_gradient(&self, log_kappa: f64) -> f64 {
        self.shape - self.rate * log_kappa.exp()
    }
}

/// Observed data laid out flat for the sampler's inner loops.
///
/// Index conventions: `[p * rows + r]` for precinct-by-row arrays and
/// `[p * columns + c]` for precinct-by-column arrays.
#[derive(Debug, Clone)]
pub struct HierarchicalModel {
    rows: usize,
    columns: usize,
    precincts: usize,
    row_shares: Vec<f64>,
    column_counts: Vec<f64>,
    row_population: Vec<f64>,
    row_totals: Vec<f64>,
    prior: ConcentrationPrior,
}

impl HierarchicalModel {
    pub fn new(data: &PrecinctSet, config: &ModelConfig) -> Self {
        let rows = data.rows();
        let columns = data.columns();
        let precincts = data.len();

        let mut row_shares = Vec::with_capacity(precincts * rows);
        let mut column_counts = Vec::with_capacity(precincts * columns);
        let mut row_population = Vec::with_capacity(precincts * rows);
        let mut row_totals = vec![0.0; rows];

        for p in data.precincts() {
            row_shares.extend_from_slice(&p.row_shares);
            column_counts.extend(p.column_counts());
            for (r, count) in p.row_counts().enumerate() {
                row_population.push(count);
                row_totals[r] += count;
            }
        }

        Self {
            rows,
            columns,
            precincts,
            row_shares,
            column_counts,
            row_population,
            row_totals,
            prior: ConcentrationPrior {
                shape: config.effective_concentration_shape(),
                rate: config.effective_concentration_rate(),
            },
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn precincts(&self) -> usize {
        self.precincts
    }

    pub fn prior(&self) -> ConcentrationPrior {
        self.prior
    }

    /// Row share `x_pr`.
    #[inline]
    pub fn row_share(&self, p: usize, r: usize) -> f64 {
        self.row_shares[p * self.rows + r]
    }

    /// Row shares of precinct `p`.
    #[inline]
    pub fn row_shares_of(&self, p: usize) -> &[f64] {
        &self.row_shares[p * self.rows..(p + 1) * self.rows]
    }

    /// Observed column counts of precinct `p`.
    #[inline]
    pub fn column_counts_of(&self, p: usize) -> &[f64] {
        &self.column_counts[p * self.columns..(p + 1) * self.columns]
    }

    /// Voters of row category `r` in precinct `p` (`N_p * x_pr`).
    #[inline]
    pub fn row_population(&self, p: usize, r: usize) -> f64 {
        self.row_population[p * self.rows + r]
    }

    /// Voters of row category `r` across all precincts.
    pub fn row_total(&self, r: usize) -> f64 {
        self.row_totals[r]
    }

    /// Multinomial log likelihood of precinct `p` at cell probabilities
    /// `theta`, without the multinomial coefficient. Zero counts contribute
    /// nothing even where `theta` is zero.
    #[inline]
    pub fn precinct_log_likelihood(&self, p: usize, theta: &[f64]) -> f64 {
        self.column_counts_of(p)
            .iter()
            .zip(theta)
            .filter(|(n, _)| **n > 0.0)
            .map(|(n, t)| n * t.ln())
            .sum()
    }

    /// Log density of everything that depends on row `r`'s hyperparameters,
    /// given `sum_log_beta[c] = sum_p ln beta_prc`:
    ///
    /// * Dirichlet densities of all `beta_pr` (with their ALR Jacobians),
    /// * the flat prior on `phi_r` (with its ALR Jacobian),
    /// * the Gamma prior on `kappa_r` (with its log Jacobian).
    pub fn row_hyper_log_density(
        &self,
        phi: &[f64],
        log_phi: &[f64],
        log_kappa: f64,
        sum_log_beta: &[f64],
    ) -> f64 {
        let kappa = log_kappa.exp();
        let n = self.precincts as f64;
        let mut normalizer = ln_gamma(kappa);
        let mut kernel = 0.0;
        for c in 0..self.columns {
            let alpha = kappa * phi[c];
            normalizer -= ln_gamma(alpha);
            kernel += alpha * sum_log_beta[c];
        }
        n * normalizer + kernel + simplex::log_jacobian(log_phi)
            + self.prior.log_density_of_log(log_kappa)
    }

    /// Mixture `theta = sum_r x_r * beta_r` for one precinct.
    ///
    /// `betas` holds the precinct's `rows * columns` preference block.
    #[inline]
    pub fn mix_theta(&self, p: usize, betas: &[f64], theta: &mut [f64]) {
        let c_n = self.columns;
        theta.iter_mut().for_each(|t| *t = 0.0);
        for (r, &x) in self.row_shares_of(p).iter().enumerate() {
            if x == 0.0 {
                continue;
            }
            for (t, b) in theta.iter_mut().zip(&betas[r * c_n..(r + 1) * c_n]) {
                *t += x * b;
            }
        }
    }
}

//! Log posterior density and gradient over the sampler's flat position.
//!
//! Position layout, with `K = C - 1`:
//!
//! * `[r * K + j]`: ALR coordinates of the typical vector `phi_r`,
//! * `[R * K + r]`: `ln kappa_r`,
//! * `[R * K + R + (p * R + r) * K + j]`: precinct offset `e_pr`.
//!
//! Precinct preferences are non-centered:
//! `alr(beta_pr) = alr(phi_r) + e_pr / sqrt(kappa_r)`, keeping the offsets near
//! unit scale at any concentration.

use statrs::function::gamma::digamma;

use super::simplex::alr_to_simplex;
use super::HierarchicalModel;

/// Constrained quantities derived from one position. Reused across
/// evaluations so the inner loop never allocates.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// `[r * C + c]`.
    pub(crate) phi: Vec<f64>,
    pub(crate) log_phi: Vec<f64>,
    /// `kappa_r`.
    pub(crate) kappa: Vec<f64>,
    /// `kappa_r^(-1/2)`, the offset scale.
    pub(crate) offset_scale: Vec<f64>,
    /// `[(p * R + r) * C + c]`.
    pub(crate) beta: Vec<f64>,
    pub(crate) log_beta: Vec<f64>,
    /// `[p * C + c]`.
    pub(crate) theta: Vec<f64>,
    /// `sum_p ln beta_prc`, `[r * C + c]`.
    pub(crate) sum_log_beta: Vec<f64>,
    alr: Vec<f64>,
    weights: Vec<f64>,
}

impl Transformed {
    pub fn new(model: &HierarchicalModel) -> Self {
        let r_n = model.rows;
        let c_n = model.columns;
        let p_n = model.precincts;
        Self {
            phi: vec![0.0; r_n * c_n],
            log_phi: vec![0.0; r_n * c_n],
            kappa: vec![0.0; r_n],
            offset_scale: vec![0.0; r_n],
            beta: vec![0.0; p_n * r_n * c_n],
            log_beta: vec![0.0; p_n * r_n * c_n],
            theta: vec![0.0; p_n * c_n],
            sum_log_beta: vec![0.0; r_n * c_n],
            alr: vec![0.0; c_n.saturating_sub(1)],
            weights: vec![0.0; c_n],
        }
    }

    /// Typical vector of row `r`.
    pub fn typical(&self, r: usize) -> &[f64] {
        let c_n = self.weights.len();
        &self.phi[r * c_n..(r + 1) * c_n]
    }

    /// Preference vector of row `r` in precinct `p`; `rows` is `R`.
    pub fn preference(&self, rows: usize, p: usize, r: usize) -> &[f64] {
        let c_n = self.weights.len();
        let block = (p * rows + r) * c_n;
        &self.beta[block..block + c_n]
    }

    /// Every precinct preference, `[(p * R + r) * C + c]`.
    pub fn preferences(&self) -> &[f64] {
        &self.beta
    }
}

impl HierarchicalModel {
    /// Length of the sampler's position vector.
    pub fn dimension(&self) -> usize {
        let k = self.columns - 1;
        self.rows * k + self.rows + self.precincts * self.rows * k
    }

    /// Start of row `r`'s typical-vector coordinates.
    #[inline]
    pub fn typical_offset(&self, r: usize) -> usize {
        r * (self.columns - 1)
    }

    /// Index of `ln kappa_r`.
    #[inline]
    pub fn concentration_index(&self, r: usize) -> usize {
        self.rows * (self.columns - 1) + r
    }

    /// Start of the offset coordinates of row `r` in precinct `p`.
    #[inline]
    pub fn precinct_offset(&self, p: usize, r: usize) -> usize {
        let k = self.columns - 1;
        self.rows * k + self.rows + (p * self.rows + r) * k
    }

    /// Fill `out` with every constrained quantity `position` implies.
    pub fn transform(&self, position: &[f64], out: &mut Transformed) {
        debug_assert_eq!(position.len(), self.dimension());
        let r_n = self.rows;
        let c_n = self.columns;
        let k = c_n - 1;

        for r in 0..r_n {
            let start = self.typical_offset(r);
            alr_to_simplex(
                &position[start..start + k],
                &mut out.phi[r * c_n..(r + 1) * c_n],
                &mut out.log_phi[r * c_n..(r + 1) * c_n],
            );
            let u = position[self.concentration_index(r)];
            out.kappa[r] = u.exp();
            out.offset_scale[r] = (-0.5 * u).exp();
        }

        out.sum_log_beta.iter_mut().for_each(|s| *s = 0.0);
        for p in 0..self.precincts {
            for r in 0..r_n {
                let typical = self.typical_offset(r);
                let offset = self.precinct_offset(p, r);
                let scale = out.offset_scale[r];
                for j in 0..k {
                    out.alr[j] = position[typical + j] + position[offset + j] * scale;
                }
                let block = (p * r_n + r) * c_n;
                alr_to_simplex(
                    &out.alr,
                    &mut out.beta[block..block + c_n],
                    &mut out.log_beta[block..block + c_n],
                );
                for c in 0..c_n {
                    out.sum_log_beta[r * c_n + c] += out.log_beta[block + c];
                }
            }
            self.mix_theta(
                p,
                &out.beta[p * r_n * c_n..(p + 1) * r_n * c_n],
                &mut out.theta[p * c_n..(p + 1) * c_n],
            );
        }
    }

    /// Log target density at `position`. `workspace` is left holding the
    /// position's transform.
    pub fn log_density(&self, position: &[f64], workspace: &mut Transformed) -> f64 {
        self.transform(position, workspace);
        self.evaluate(position, workspace)
    }

    /// Log target density and its gradient at `position`.
    pub fn log_density_gradient(
        &self,
        position: &[f64],
        workspace: &mut Transformed,
        gradient: &mut [f64],
    ) -> f64 {
        debug_assert_eq!(gradient.len(), self.dimension());
        self.transform(position, workspace);
        let log_density = self.evaluate(position, workspace);
        gradient.iter_mut().for_each(|g| *g = 0.0);

        let r_n = self.rows;
        let c_n = self.columns;
        let k = c_n - 1;
        let p_n = self.precincts as f64;
        let t = workspace;

        for r in 0..r_n {
            let u = position[self.concentration_index(r)];
            let kappa = t.kappa[r];
            let phi = &t.phi[r * c_n..(r + 1) * c_n];
            let sum_log = &t.sum_log_beta[r * c_n..(r + 1) * c_n];
            let mut weighted = 0.0;
            for c in 0..c_n {
                let v = kappa * (sum_log[c] - p_n * digamma(kappa * phi[c]));
                t.weights[c] = v;
                weighted += phi[c] * v;
            }
            let typical = self.typical_offset(r);
            for j in 0..k {
                gradient[typical + j] +=
                    phi[j] * (t.weights[j] - weighted) + 1.0 - c_n as f64 * phi[j];
            }
            gradient[self.concentration_index(r)] += kappa * p_n * digamma(kappa)
                + weighted
                + self.prior.log_density_of_log_gradient(u)
                - 0.5 * (k * self.precincts) as f64;
        }

        for p in 0..self.precincts {
            let counts = self.column_counts_of(p);
            let theta = &t.theta[p * c_n..(p + 1) * c_n];
            for r in 0..r_n {
                let x = self.row_share(p, r);
                let kappa = t.kappa[r];
                let scale = t.offset_scale[r];
                let block = (p * r_n + r) * c_n;
                let mut total = 0.0;
                for c in 0..c_n {
                    let pull = if counts[c] > 0.0 {
                        counts[c] * x / theta[c]
                    } else {
                        0.0
                    };
                    let w = kappa * t.phi[r * c_n + c] + pull * t.beta[block + c];
                    t.weights[c] = w;
                    total += w;
                }
                let typical = self.typical_offset(r);
                let offset = self.precinct_offset(p, r);
                let concentration = self.concentration_index(r);
                for j in 0..k {
                    // Gradient with respect to alr(beta_pr)_j, then the chain rule.
                    let g = t.weights[j] - t.beta[block + j] * total;
                    gradient[offset + j] = g * scale;
                    gradient[typical + j] += g;
                    gradient[concentration] -= 0.5 * g * position[offset + j] * scale;
                }
            }
        }

        log_density
    }

    fn evaluate(&self, position: &[f64], t: &Transformed) -> f64 {
        let c_n = self.columns;
        let k = c_n - 1;
        let likelihood: f64 = (0..self.precincts)
            .map(|p| self.precinct_log_likelihood(p, &t.theta[p * c_n..(p + 1) * c_n]))
            .sum();
        let hyper: f64 = (0..self.rows)
            .map(|r| {
                let span = r * c_n..(r + 1) * c_n;
                let u = position[self.concentration_index(r)];
                self.row_hyper_log_density(
                    &t.phi[span.clone()],
                    &t.log_phi[span.clone()],
                    u,
                    &t.sum_log_beta[span],
                ) - 0.5 * (k * self.precincts) as f64 * u
            })
            .sum();
        likelihood + hyper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossvote_core::config::ModelConfig;
    use crossvote_core::types::{Precinct, PrecinctSet};

    fn model() -> HierarchicalModel {
        let data = PrecinctSet::new(vec![
            Precinct {
                id: "a".into(),
                population: 400,
                row_shares: vec![0.3, 0.7],
                column_shares: vec![0.2, 0.3, 0.5],
            },
            Precinct {
                id: "b".into(),
                population: 900,
                row_shares: vec![0.6, 0.4],
                column_shares: vec![0.5, 0.5, 0.0],
            },
            Precinct {
                id: "c".into(),
                population: 250,
                row_shares: vec![1.0, 0.0],
                column_shares: vec![0.1, 0.6, 0.3],
            },
        ])
        .unwrap();
        HierarchicalModel::new(&data, &ModelConfig::default())
    }

    fn position(model: &HierarchicalModel) -> Vec<f64> {
        (0..model.dimension())
            .map(|i| 0.4 * ((i as f64) * 1.7).sin() + 0.1)
            .collect()
    }

    #[test]
    fn test_layout_indices() {
        let model = model();
        // R = 2, K = 2, P = 3.
        assert_eq!(model.dimension(), 4 + 2 + 12);
        assert_eq!(model.typical_offset(1), 2);
        assert_eq!(model.concentration_index(0), 4);
        assert_eq!(model.precinct_offset(0, 0), 6);
        assert_eq!(model.precinct_offset(2, 1), 6 + 5 * 2);
    }

    #[test]
    fn test_zero_offsets_put_precincts_on_typical_vector() {
        let model = model();
        let mut position = position(&model);
        for p in 0..3 {
            for r in 0..2 {
                let start = model.precinct_offset(p, r);
                position[start..start + 2].iter_mut().for_each(|v| *v = 0.0);
            }
        }
        let mut t = Transformed::new(&model);
        model.transform(&position, &mut t);
        for p in 0..3 {
            for r in 0..2 {
                for (a, b) in t.preference(2, p, r).iter().zip(t.typical(r)) {
                    assert!((a - b).abs() < 1e-12);
                }
            }
        }
        for theta in t.theta.chunks(3) {
            assert!((theta.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let model = model();
        let position = position(&model);
        let mut t = Transformed::new(&model);
        let mut gradient = vec![0.0; model.dimension()];
        let value = model.log_density_gradient(&position, &mut t, &mut gradient);
        assert!((value - model.log_density(&position, &mut t)).abs() < 1e-9);

        let h = 1e-6;
        for i in 0..position.len() {
            let mut up = position.clone();
            up[i] += h;
            let mut down = position.clone();
            down[i] -= h;
            let numeric =
                (model.log_density(&up, &mut t) - model.log_density(&down, &mut t)) / (2.0 * h);
            let err = (numeric - gradient[i]).abs() / (1.0 + numeric.abs());
            assert!(err < 1e-5, "coordinate {i}: numeric {numeric}, analytic {}", gradient[i]);
        }
    }

    #[test]
    fn test_density_finite_at_large_concentration() {
        let model = model();
        let mut position = position(&model);
        for r in 0..2 {
            position[model.concentration_index(r)] = 12.0;
        }
        let mut t = Transformed::new(&model);
        let mut gradient = vec![0.0; model.dimension()];
        let value = model.log_density_gradient(&position, &mut t, &mut gradient);
        assert!(value.is_finite());
        assert!(gradient.iter().all(|g| g.is_finite()));
    }
}

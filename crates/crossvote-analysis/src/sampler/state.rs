//! Chain starting points in unconstrained coordinates.

use rand::Rng;
use rand_distr::{Exp1, StandardNormal};

use crate::model::simplex::simplex_to_alr;
use crate::model::HierarchicalModel;

/// Spread of precinct preferences around the typical vector at start,
/// in ALR units.
const INIT_PRECINCT_JITTER: f64 = 0.5;
/// Range of initial concentrations drawn for dispersed starts.
const INIT_LOG_KAPPA_RANGE: (f64, f64) = (1.6, 6.2);

/// Explicit starting point for one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainInit {
    /// One typical vector per row category; each a strictly positive simplex.
    pub typical: Vec<Vec<f64>>,
    /// One concentration per row category; each positive.
    pub concentration: Vec<f64>,
}

/// Sampler state for one chain: a point in the model's position space
/// (see [`crate::model::density`] for the layout).
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    pub(crate) position: Vec<f64>,
}

impl ChainState {
    /// Overdispersed random start: typical vectors drawn from a flattened
    /// Dirichlet(1), log concentrations uniform over a wide range, precinct
    /// preferences jittered around their typical vector.
    pub fn dispersed<G: Rng + ?Sized>(model: &HierarchicalModel, rng: &mut G) -> Self {
        let r_n = model.rows();
        let c_n = model.columns();
        let mut typical = Vec::with_capacity(r_n);
        let mut concentration = Vec::with_capacity(r_n);
        for _ in 0..r_n {
            let draws: Vec<f64> = (0..c_n).map(|_| rng.sample::<f64, _>(Exp1)).collect();
            let total: f64 = draws.iter().sum();
            let uniform = 1.0 / c_n as f64;
            typical.push(
                draws
                    .iter()
                    .map(|d| 0.5 * d / total + 0.5 * uniform)
                    .collect(),
            );
            let (lo, hi) = INIT_LOG_KAPPA_RANGE;
            concentration.push(rng.gen_range(lo..hi).exp());
        }
        Self::from_init(
            model,
            &ChainInit {
                typical,
                concentration,
            },
            rng,
        )
    }

    /// Start from an explicit point. Precinct preferences are jittered
    /// around the typical vectors by `INIT_PRECINCT_JITTER` ALR units,
    /// whatever the concentration.
    pub fn from_init<G: Rng + ?Sized>(
        model: &HierarchicalModel,
        init: &ChainInit,
        rng: &mut G,
    ) -> Self {
        let k = model.columns() - 1;
        let mut position = vec![0.0; model.dimension()];
        for r in 0..model.rows() {
            let start = model.typical_offset(r);
            simplex_to_alr(&init.typical[r], &mut position[start..start + k]);
            position[model.concentration_index(r)] = init.concentration[r].ln();
        }
        for p in 0..model.precincts() {
            for r in 0..model.rows() {
                let spread = INIT_PRECINCT_JITTER * init.concentration[r].sqrt();
                let start = model.precinct_offset(p, r);
                for e in &mut position[start..start + k] {
                    let z: f64 = rng.sample(StandardNormal);
                    *e = spread * z;
                }
            }
        }
        Self { position }
    }

    /// The unconstrained coordinates.
    pub fn position(&self) -> &[f64] {
        &self.position
    }
}

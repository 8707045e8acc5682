//! No-U-turn Hamiltonian transitions with multinomial sampling along the
//! trajectory and a diagonal metric.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::model::density::Transformed;
use crate::model::HierarchicalModel;

/// Energy error past which a trajectory counts as divergent.
const MAX_ENERGY_ERROR: f64 = 1000.0;
/// Acceptance of one leapfrog step the step-size heuristic aims across.
const HEURISTIC_ACCEPT: f64 = 0.8;
const MAX_HEURISTIC_ROUNDS: usize = 100;
const MIN_STEP_SIZE: f64 = 1e-12;
const MAX_STEP_SIZE: f64 = 1e7;

/// A point in phase space with its cached density and gradient.
#[derive(Debug, Clone)]
pub(crate) struct Point {
    pub(crate) position: Vec<f64>,
    pub(crate) momentum: Vec<f64>,
    pub(crate) gradient: Vec<f64>,
    pub(crate) log_density: f64,
}

impl Point {
    pub(crate) fn new(
        model: &HierarchicalModel,
        position: Vec<f64>,
        workspace: &mut Transformed,
    ) -> Self {
        let dim = position.len();
        let mut gradient = vec![0.0; dim];
        let log_density = model.log_density_gradient(&position, workspace, &mut gradient);
        Self {
            position,
            momentum: vec![0.0; dim],
            gradient,
            log_density,
        }
    }

    fn copy_from(&mut self, other: &Point) {
        self.position.copy_from_slice(&other.position);
        self.momentum.copy_from_slice(&other.momentum);
        self.gradient.copy_from_slice(&other.gradient);
        self.log_density = other.log_density;
    }
}

/// What one transition did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Transition {
    /// Mean of `min(1, exp(-energy error))` over visited leapfrog steps.
    pub(crate) accept_stat: f64,
    /// Completed trajectory doublings.
    pub(crate) depth: usize,
    pub(crate) leapfrogs: usize,
    pub(crate) diverged: bool,
}

/// Buffers one level of the tree recursion needs for its second half.
#[derive(Debug, Clone, Default)]
struct Subtree {
    near_position: Vec<f64>,
    near_momentum: Vec<f64>,
    proposal: Option<Point>,
}

/// Running totals over one trajectory.
#[derive(Debug, Default)]
struct TreeStats {
    accept_sum: f64,
    leapfrogs: usize,
    diverged: bool,
}

pub(crate) struct Nuts<'a> {
    model: &'a HierarchicalModel,
    inverse_metric: Vec<f64>,
    step_size: f64,
    max_depth: usize,
    workspace: Transformed,
    pool: Vec<Subtree>,
}

impl<'a> Nuts<'a> {
    pub(crate) fn new(model: &'a HierarchicalModel, max_depth: usize) -> Self {
        Self {
            model,
            inverse_metric: vec![1.0; model.dimension()],
            step_size: 0.1,
            max_depth,
            workspace: Transformed::new(model),
            pool: vec![Subtree::default(); max_depth + 1],
        }
    }

    pub(crate) fn step_size(&self) -> f64 {
        self.step_size
    }

    pub(crate) fn set_step_size(&mut self, step_size: f64) {
        self.step_size = step_size;
    }

    pub(crate) fn set_inverse_metric(&mut self, inverse_metric: Vec<f64>) {
        debug_assert_eq!(inverse_metric.len(), self.inverse_metric.len());
        self.inverse_metric = inverse_metric;
    }

    fn sample_momentum<G: Rng + ?Sized>(&self, momentum: &mut [f64], rng: &mut G) {
        for (p, m) in momentum.iter_mut().zip(&self.inverse_metric) {
            let z: f64 = rng.sample(StandardNormal);
            *p = z / m.sqrt();
        }
    }

    fn kinetic(&self, momentum: &[f64]) -> f64 {
        0.5 * momentum
            .iter()
            .zip(&self.inverse_metric)
            .map(|(p, m)| p * p * m)
            .sum::<f64>()
    }

    fn hamiltonian(&self, point: &Point) -> f64 {
        let h = -point.log_density + self.kinetic(&point.momentum);
        if h.is_finite() {
            h
        } else {
            f64::INFINITY
        }
    }

    fn leapfrog(&mut self, point: &mut Point, step: f64) {
        for (p, g) in point.momentum.iter_mut().zip(&point.gradient) {
            *p += 0.5 * step * g;
        }
        for ((q, p), m) in point
            .position
            .iter_mut()
            .zip(&point.momentum)
            .zip(&self.inverse_metric)
        {
            *q += step * m * p;
        }
        point.log_density = self.model.log_density_gradient(
            &point.position,
            &mut self.workspace,
            &mut point.gradient,
        );
        for (p, g) in point.momentum.iter_mut().zip(&point.gradient) {
            *p += 0.5 * step * g;
        }
    }

    /// Whether the trajectory from `(q_minus, p_minus)` to `(q_plus, p_plus)`
    /// has started to double back on itself.
    fn is_turning(
        &self,
        q_minus: &[f64],
        q_plus: &[f64],
        p_minus: &[f64],
        p_plus: &[f64],
    ) -> bool {
        let mut forward = 0.0;
        let mut backward = 0.0;
        for i in 0..q_minus.len() {
            let span = (q_plus[i] - q_minus[i]) * self.inverse_metric[i];
            forward += span * p_plus[i];
            backward += span * p_minus[i];
        }
        forward < 0.0 || backward < 0.0
    }

    /// One transition from `current`, which is replaced by the sampled point.
    pub(crate) fn transition<G: Rng + ?Sized>(
        &mut self,
        current: &mut Point,
        rng: &mut G,
    ) -> Transition {
        let mut minus = current.clone();
        self.sample_momentum(&mut minus.momentum, rng);
        let initial_energy = self.hamiltonian(&minus);
        let mut plus = minus.clone();
        let mut proposal = minus.clone();
        let mut near_position = vec![0.0; minus.position.len()];
        let mut near_momentum = vec![0.0; minus.position.len()];

        let mut stats = TreeStats::default();
        let mut log_weight = 0.0;
        let mut depth = 0;
        while depth < self.max_depth {
            let forward = rng.gen::<bool>();
            let (edge, direction) = if forward {
                (&mut plus, 1.0)
            } else {
                (&mut minus, -1.0)
            };
            let subtree = self.build_tree(
                edge,
                direction,
                depth,
                initial_energy,
                &mut near_position,
                &mut near_momentum,
                &mut proposal,
                &mut stats,
                rng,
            );
            let Some(subtree_weight) = subtree else {
                break;
            };
            depth += 1;

            // Biased progressive sampling favors the newer half.
            if rng.gen::<f64>().ln() < subtree_weight - log_weight {
                current.copy_from(&proposal);
            }
            log_weight = log_add_exp(log_weight, subtree_weight);

            if self.is_turning(&minus.position, &plus.position, &minus.momentum, &plus.momentum) {
                break;
            }
        }

        Transition {
            accept_stat: if stats.leapfrogs == 0 {
                0.0
            } else {
                stats.accept_sum / stats.leapfrogs as f64
            },
            depth,
            leapfrogs: stats.leapfrogs,
            diverged: stats.diverged,
        }
    }

    /// Extend the trajectory by `2^depth` leapfrog steps from `edge`, which
    /// ends at the new far end. Writes the subtree's near end and its sampled
    /// point. Returns the subtree's log weight, or `None` when it diverged or
    /// turned back.
    #[allow(clippy::too_many_arguments)]
    fn build_tree<G: Rng + ?Sized>(
        &mut self,
        edge: &mut Point,
        direction: f64,
        depth: usize,
        initial_energy: f64,
        near_position: &mut [f64],
        near_momentum: &mut [f64],
        proposal: &mut Point,
        stats: &mut TreeStats,
        rng: &mut G,
    ) -> Option<f64> {
        if depth == 0 {
            self.leapfrog(edge, direction * self.step_size);
            stats.leapfrogs += 1;
            let energy_error = self.hamiltonian(edge) - initial_energy;
            // NaN counts: a non-finite start diverges on its first step.
            if !(energy_error <= MAX_ENERGY_ERROR) {
                stats.diverged = true;
                return None;
            }
            stats.accept_sum += (-energy_error).exp().min(1.0);
            near_position.copy_from_slice(&edge.position);
            near_momentum.copy_from_slice(&edge.momentum);
            proposal.copy_from(edge);
            return Some(-energy_error);
        }

        let first = self.build_tree(
            edge,
            direction,
            depth - 1,
            initial_energy,
            near_position,
            near_momentum,
            proposal,
            stats,
            rng,
        )?;

        let mut scratch = std::mem::take(&mut self.pool[depth]);
        if scratch.near_position.len() != edge.position.len() {
            scratch.near_position = vec![0.0; edge.position.len()];
            scratch.near_momentum = vec![0.0; edge.position.len()];
        }
        let second_proposal = scratch.proposal.get_or_insert_with(|| edge.clone());
        let second = self.build_tree(
            edge,
            direction,
            depth - 1,
            initial_energy,
            &mut scratch.near_position,
            &mut scratch.near_momentum,
            second_proposal,
            stats,
            rng,
        );

        let result = match second {
            Some(second) => {
                let total = log_add_exp(first, second);
                // Uniform progressive sampling inside a subtree.
                if rng.gen::<f64>().ln() < second - total {
                    proposal.copy_from(second_proposal);
                }
                let turning = if direction > 0.0 {
                    self.is_turning(near_position, &edge.position, near_momentum, &edge.momentum)
                } else {
                    self.is_turning(&edge.position, near_position, &edge.momentum, near_momentum)
                };
                if turning {
                    None
                } else {
                    Some(total)
                }
            }
            None => None,
        };
        self.pool[depth] = scratch;
        result
    }

    /// Double or halve the step size until one leapfrog step from `current`
    /// crosses the acceptance level `HEURISTIC_ACCEPT`, ending on a step
    /// that clears it.
    pub(crate) fn find_reasonable_step_size<G: Rng + ?Sized>(
        &mut self,
        current: &Point,
        rng: &mut G,
    ) -> f64 {
        let mut step = self.step_size;
        let mut trial = current.clone();
        let threshold = HEURISTIC_ACCEPT.ln();
        let mut direction = 0.0;
        for _ in 0..MAX_HEURISTIC_ROUNDS {
            trial.copy_from(current);
            self.sample_momentum(&mut trial.momentum, rng);
            let initial_energy = self.hamiltonian(&trial);
            self.leapfrog(&mut trial, step);
            let delta = initial_energy - self.hamiltonian(&trial);
            let sign = if delta > threshold { 1.0 } else { -1.0 };
            if direction == 0.0 {
                direction = sign;
            } else if sign != direction {
                // Keep the last doubled step that still passed.
                if direction > 0.0 {
                    step *= 0.5;
                }
                break;
            }
            let next = if direction > 0.0 { step * 2.0 } else { step * 0.5 };
            if !(MIN_STEP_SIZE..=MAX_STEP_SIZE).contains(&next) {
                break;
            }
            step = next;
        }
        self.step_size = step;
        step
    }
}

fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossvote_core::config::ModelConfig;
    use crossvote_core::types::{Precinct, PrecinctSet};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use crate::sampler::state::ChainState;

    fn model() -> HierarchicalModel {
        let precincts = (0..6)
            .map(|i| {
                let x = 0.2 + 0.1 * i as f64;
                let share = 0.9 * x + 0.2 * (1.0 - x);
                Precinct {
                    id: format!("p{i}"),
                    population: 500,
                    row_shares: vec![x, 1.0 - x],
                    column_shares: vec![share, 1.0 - share],
                }
            })
            .collect();
        HierarchicalModel::new(&PrecinctSet::new(precincts).unwrap(), &ModelConfig::default())
    }

    fn start(model: &HierarchicalModel, seed: u64) -> (Point, Xoshiro256PlusPlus) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let state = ChainState::dispersed(model, &mut rng);
        let mut workspace = Transformed::new(model);
        (Point::new(model, state.position, &mut workspace), rng)
    }

    #[test]
    fn test_log_add_exp() {
        assert!((log_add_exp(0.0, 0.0) - 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, -3.0), -3.0);
        assert!((log_add_exp(-1000.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_leapfrog_is_reversible() {
        let model = model();
        let (mut point, mut rng) = start(&model, 11);
        let mut nuts = Nuts::new(&model, 10);
        nuts.sample_momentum(&mut point.momentum, &mut rng);
        let original = point.clone();
        for _ in 0..5 {
            nuts.leapfrog(&mut point, 1e-3);
        }
        point.momentum.iter_mut().for_each(|p| *p = -*p);
        for _ in 0..5 {
            nuts.leapfrog(&mut point, 1e-3);
        }
        for (a, b) in point.position.iter().zip(&original.position) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn test_small_steps_conserve_energy() {
        let model = model();
        let (mut point, mut rng) = start(&model, 12);
        let mut nuts = Nuts::new(&model, 10);
        nuts.sample_momentum(&mut point.momentum, &mut rng);
        let before = nuts.hamiltonian(&point);
        for _ in 0..20 {
            nuts.leapfrog(&mut point, 1e-5);
        }
        assert!((nuts.hamiltonian(&point) - before).abs() < 1e-3);
    }

    #[test]
    fn test_transition_reports_trajectory() {
        let model = model();
        let (mut point, mut rng) = start(&model, 13);
        let mut nuts = Nuts::new(&model, 6);
        nuts.find_reasonable_step_size(&point, &mut rng);
        let before = point.position.clone();
        let transition = nuts.transition(&mut point, &mut rng);
        assert!(transition.leapfrogs >= 1);
        assert!(transition.depth <= 6);
        assert!((0.0..=1.0).contains(&transition.accept_stat));
        assert!(point.log_density.is_finite());
        assert_eq!(point.position.len(), before.len());
    }

    #[test]
    fn test_huge_step_diverges() {
        let model = model();
        let (mut point, mut rng) = start(&model, 14);
        let mut nuts = Nuts::new(&model, 10);
        nuts.set_step_size(1e4);
        let before = point.position.clone();
        let transition = nuts.transition(&mut point, &mut rng);
        assert!(transition.diverged);
        assert_eq!(transition.depth, 0);
        assert_eq!(point.position, before);
    }

    #[test]
    fn test_step_size_heuristic_lands_on_usable_step() {
        let model = model();
        let (point, mut rng) = start(&model, 15);
        let mut nuts = Nuts::new(&model, 10);
        let step = nuts.find_reasonable_step_size(&point, &mut rng);
        assert!(step > MIN_STEP_SIZE && step < 10.0);
        assert_eq!(nuts.step_size(), step);
    }
}

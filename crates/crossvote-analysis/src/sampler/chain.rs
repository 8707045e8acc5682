//! One Markov chain: NUTS transitions over the whole unconstrained state.
//!
//! Warm-up tunes the step size by dual averaging toward the target
//! acceptance statistic and learns a diagonal metric over doubling windows;
//! each new metric restarts the step-size search. Everything is frozen once
//! warm-up ends.

use rand_xoshiro::Xoshiro256PlusPlus;

use crossvote_core::traits::{Cancellable, CancellationToken};

use super::adapt::{MetricAdaptation, StepSizeAdaptation};
use super::nuts::{Nuts, Point, Transition};
use super::output::{ChainOutput, ChainStats, Draw};
use super::state::ChainState;
use super::SamplerSettings;
use crate::model::density::Transformed;
use crate::model::HierarchicalModel;

/// Post-warm-up transition totals.
#[derive(Debug, Default)]
struct Tally {
    transitions: usize,
    accept_sum: f64,
    depth_sum: usize,
    max_depth_hits: usize,
    leapfrogs: usize,
}

impl Tally {
    fn add(&mut self, transition: &Transition, max_depth: usize) {
        self.transitions += 1;
        self.accept_sum += transition.accept_stat;
        self.depth_sum += transition.depth;
        if transition.depth >= max_depth {
            self.max_depth_hits += 1;
        }
        self.leapfrogs += transition.leapfrogs;
    }

    fn stats(&self, step_size: f64) -> ChainStats {
        let n = self.transitions.max(1) as f64;
        ChainStats {
            step_size,
            mean_accept_stat: self.accept_sum / n,
            mean_tree_depth: self.depth_sum as f64 / n,
            max_depth_hits: self.max_depth_hits,
            leapfrogs: self.leapfrogs,
        }
    }
}

pub(crate) struct Chain<'a> {
    model: &'a HierarchicalModel,
    index: usize,
    state: ChainState,
    rng: Xoshiro256PlusPlus,
    target_accept: f64,
    max_depth: usize,
    workspace: Transformed,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(
        model: &'a HierarchicalModel,
        index: usize,
        state: ChainState,
        rng: Xoshiro256PlusPlus,
        settings: &SamplerSettings,
    ) -> Self {
        Self {
            model,
            index,
            state,
            rng,
            target_accept: settings.target_accept,
            max_depth: settings.max_tree_depth,
            workspace: Transformed::new(model),
        }
    }

    /// Run `warmup` adapting transitions then `draws` recorded ones,
    /// stopping early at a draw boundary if `token` is cancelled.
    pub(crate) fn run(
        mut self,
        warmup: usize,
        draws: usize,
        token: &CancellationToken,
    ) -> ChainOutput {
        let model = self.model;
        let mut output = ChainOutput {
            chain: self.index,
            draws: Vec::with_capacity(draws),
            precinct_sums: vec![0.0; model.precincts() * model.rows() * model.columns()],
            stats: ChainStats::default(),
            warmup_divergences: 0,
            cancelled: false,
        };

        let position = std::mem::take(&mut self.state.position);
        let mut current = Point::new(model, position, &mut self.workspace);
        let mut nuts = Nuts::new(model, self.max_depth);
        let initial_step = nuts.find_reasonable_step_size(&current, &mut self.rng);
        let mut step_adaptation = StepSizeAdaptation::new(self.target_accept, initial_step);
        let mut metric_adaptation = MetricAdaptation::new(model.dimension(), warmup);
        let mut tally = Tally::default();

        for iteration in 0..warmup + draws {
            if token.is_cancelled() {
                tracing::debug!(
                    chain = self.index,
                    iteration,
                    retained = output.draws.len(),
                    "chain cancelled"
                );
                output.cancelled = true;
                break;
            }
            let transition = nuts.transition(&mut current, &mut self.rng);

            if iteration < warmup {
                if transition.diverged {
                    output.warmup_divergences += 1;
                }
                nuts.set_step_size(step_adaptation.update(transition.accept_stat));
                if let Some(inverse_metric) = metric_adaptation.observe(&current.position) {
                    nuts.set_inverse_metric(inverse_metric);
                    let step = nuts.find_reasonable_step_size(&current, &mut self.rng);
                    step_adaptation.restart(step);
                    tracing::trace!(chain = self.index, iteration, step, "metric updated");
                }
                if iteration + 1 == warmup {
                    nuts.set_step_size(step_adaptation.adapted());
                    tracing::debug!(
                        chain = self.index,
                        step_size = nuts.step_size(),
                        divergences = output.warmup_divergences,
                        "warm-up finished"
                    );
                }
                continue;
            }

            tally.add(&transition, self.max_depth);
            output.draws.push(self.record(&current, transition.diverged));
            for (sum, b) in output
                .precinct_sums
                .iter_mut()
                .zip(self.workspace.preferences())
            {
                *sum += b;
            }
        }

        output.stats = tally.stats(nuts.step_size());
        tracing::debug!(
            chain = self.index,
            draws = output.draws.len(),
            divergences = output.divergences(),
            step_size = output.stats.step_size,
            mean_accept_stat = output.stats.mean_accept_stat,
            mean_tree_depth = output.stats.mean_tree_depth,
            max_depth_hits = output.stats.max_depth_hits,
            "chain finished"
        );
        output
    }

    /// Summarize `point`, leaving its transform in the workspace.
    fn record(&mut self, point: &Point, divergent: bool) -> Draw {
        let model = self.model;
        let r_n = model.rows();
        let c_n = model.columns();
        let p_n = model.precincts();
        model.transform(&point.position, &mut self.workspace);
        let t = &self.workspace;

        let mut precinct_mean = vec![0.0; r_n * c_n];
        let mut district = vec![0.0; r_n * c_n];
        for p in 0..p_n {
            for r in 0..r_n {
                let weight = model.row_population(p, r);
                for (c, b) in t.preference(r_n, p, r).iter().enumerate() {
                    precinct_mean[r * c_n + c] += b;
                    district[r * c_n + c] += weight * b;
                }
            }
        }
        let mut typical = Vec::with_capacity(r_n * c_n);
        for r in 0..r_n {
            typical.extend_from_slice(t.typical(r));
        }
        for r in 0..r_n {
            let total = model.row_total(r);
            for c in 0..c_n {
                let i = r * c_n + c;
                precinct_mean[i] /= p_n as f64;
                // No voters in this row anywhere: fall back to the typical vector.
                district[i] = if total > 0.0 {
                    district[i] / total
                } else {
                    typical[i]
                };
            }
        }

        Draw {
            typical,
            log_concentration: (0..r_n)
                .map(|r| point.position[model.concentration_index(r)])
                .collect(),
            precinct_mean,
            district,
            log_density: point.log_density,
            divergent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossvote_core::config::ModelConfig;
    use crossvote_core::types::{Precinct, PrecinctSet};
    use rand::SeedableRng;

    fn model() -> HierarchicalModel {
        let precincts = (0..8)
            .map(|i| {
                let x = 0.1 + 0.1 * i as f64;
                let share = 0.8 * x + 0.3 * (1.0 - x);
                Precinct {
                    id: format!("p{i}"),
                    population: 400,
                    row_shares: vec![x, 1.0 - x],
                    column_shares: vec![share, 1.0 - share],
                }
            })
            .collect();
        HierarchicalModel::new(&PrecinctSet::new(precincts).unwrap(), &ModelConfig::default())
    }

    fn run(model: &HierarchicalModel, warmup: usize, draws: usize) -> ChainOutput {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(21);
        let state = ChainState::dispersed(model, &mut rng);
        let settings = SamplerSettings::default();
        Chain::new(model, 0, state, rng, &settings).run(warmup, draws, &CancellationToken::new())
    }

    #[test]
    fn test_chain_records_every_draw() {
        let model = model();
        let output = run(&model, 100, 50);
        assert_eq!(output.draws.len(), 50);
        assert!(!output.cancelled);
        assert!(output.stats.step_size > 0.0);
        assert!(output.stats.leapfrogs >= 50);
        for draw in &output.draws {
            assert!(draw.log_density.is_finite());
            for row in draw.district.chunks(2) {
                assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            }
        }
        let sum: f64 = output.precinct_sums[..2].iter().sum();
        assert!((sum - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_tally_counts_depth_limit_hits() {
        let mut tally = Tally::default();
        let deep = Transition {
            accept_stat: 0.9,
            depth: 10,
            leapfrogs: 1023,
            diverged: false,
        };
        let shallow = Transition {
            accept_stat: 0.7,
            depth: 3,
            leapfrogs: 7,
            diverged: false,
        };
        tally.add(&deep, 10);
        tally.add(&shallow, 10);
        let stats = tally.stats(0.2);
        assert_eq!(stats.max_depth_hits, 1);
        assert_eq!(stats.leapfrogs, 1030);
        assert!((stats.mean_accept_stat - 0.8).abs() < 1e-12);
        assert!((stats.mean_tree_depth - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_cancelled_token_stops_before_first_draw() {
        let model = model();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let state = ChainState::dispersed(&model, &mut rng);
        let token = CancellationToken::new();
        token.cancel();
        let output = Chain::new(&model, 0, state, rng, &SamplerSettings::default())
            .run(10, 10, &token);
        assert!(output.cancelled);
        assert!(output.draws.is_empty());
    }
}

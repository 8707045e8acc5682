//! Multi-chain posterior sampler.
//!
//! Chains run in parallel on a dedicated rayon pool. Every chain owns a
//! generator derived from the run seed by `jump()`s, so results depend on
//! the seed and chain count only, never on the thread count or scheduling.

pub mod adapt;
mod chain;
mod nuts;
pub mod output;
pub mod state;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crossvote_core::config::SamplerConfig;
use crossvote_core::constants::MAX_TREE_DEPTH_LIMIT;
use crossvote_core::errors::SamplerError;
use crossvote_core::traits::CancellationToken;

use crate::model::HierarchicalModel;
use chain::Chain;

pub use output::{ChainOutput, ChainStats, Draw, ParameterSeries, SamplerRun};
pub use state::{ChainInit, ChainState};

/// Resolved sampler settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    pub draws: usize,
    pub warmup: usize,
    pub chains: usize,
    pub seed: u64,
    pub threads: Option<usize>,
    /// Mean acceptance statistic the step size is tuned toward.
    pub target_accept: f64,
    /// Cap on trajectory doublings per transition.
    pub max_tree_depth: usize,
}

impl SamplerSettings {
    pub fn from_config(config: &SamplerConfig) -> Self {
        Self {
            draws: config.effective_draws(),
            warmup: config.effective_warmup(),
            chains: config.effective_chains(),
            seed: config.effective_seed(),
            threads: config.threads,
            target_accept: config.effective_target_accept(),
            max_tree_depth: config.effective_max_tree_depth(),
        }
    }

    fn validate(&self, model: &HierarchicalModel) -> Result<(), SamplerError> {
        if self.draws == 0 {
            return Err(SamplerError::InvalidSettings("draws must be positive".into()));
        }
        if self.chains == 0 {
            return Err(SamplerError::InvalidSettings("chains must be positive".into()));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(SamplerError::InvalidSettings(format!(
                "target_accept must be in (0, 1), got {}",
                self.target_accept
            )));
        }
        if self.max_tree_depth == 0 || self.max_tree_depth > MAX_TREE_DEPTH_LIMIT {
            return Err(SamplerError::InvalidSettings(format!(
                "max_tree_depth must be in 1..={MAX_TREE_DEPTH_LIMIT}, got {}",
                self.max_tree_depth
            )));
        }
        if self.threads == Some(0) {
            return Err(SamplerError::InvalidSettings("threads must be positive".into()));
        }
        if model.columns() < 2 {
            return Err(SamplerError::InvalidSettings(format!(
                "at least 2 column categories are required, got {}",
                model.columns()
            )));
        }
        Ok(())
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self::from_config(&SamplerConfig::default())
    }
}

/// Runs independent chains against one model.
pub struct Sampler<'a> {
    model: &'a HierarchicalModel,
    settings: SamplerSettings,
}

impl<'a> Sampler<'a> {
    pub fn new(model: &'a HierarchicalModel, settings: SamplerSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Run every chain from an overdispersed random start.
    pub fn run(&self, token: &CancellationToken) -> Result<SamplerRun, SamplerError> {
        self.run_chains(None, token)
    }

    /// Run chain `k` from `inits[k]`; `inits` must hold one entry per chain.
    pub fn run_with_inits(
        &self,
        inits: &[ChainInit],
        token: &CancellationToken,
    ) -> Result<SamplerRun, SamplerError> {
        if inits.len() != self.settings.chains {
            return Err(SamplerError::InvalidSettings(format!(
                "{} initial points for {} chains",
                inits.len(),
                self.settings.chains
            )));
        }
        for (k, init) in inits.iter().enumerate() {
            self.check_init(k, init)?;
        }
        self.run_chains(Some(inits), token)
    }

    fn check_init(&self, k: usize, init: &ChainInit) -> Result<(), SamplerError> {
        let invalid = |what: &str| {
            Err(SamplerError::InvalidSettings(format!(
                "initial point for chain {k}: {what}"
            )))
        };
        let r_n = self.model.rows();
        let c_n = self.model.columns();
        if init.typical.len() != r_n || init.concentration.len() != r_n {
            return invalid("wrong number of row categories");
        }
        for phi in &init.typical {
            if phi.len() != c_n {
                return invalid("typical vector has the wrong width");
            }
            if phi.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                return invalid("typical vector must be strictly positive");
            }
            if (phi.iter().sum::<f64>() - 1.0).abs() > 1e-9 {
                return invalid("typical vector must sum to 1");
            }
        }
        if init
            .concentration
            .iter()
            .any(|c| !(c.is_finite() && *c > 0.0))
        {
            return invalid("concentrations must be positive");
        }
        Ok(())
    }

    fn run_chains(
        &self,
        inits: Option<&[ChainInit]>,
        token: &CancellationToken,
    ) -> Result<SamplerRun, SamplerError> {
        let settings = &self.settings;
        settings.validate(self.model)?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = settings.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| SamplerError::ThreadPool(e.to_string()))?;

        tracing::info!(
            chains = settings.chains,
            warmup = settings.warmup,
            draws = settings.draws,
            seed = settings.seed,
            precincts = self.model.precincts(),
            rows = self.model.rows(),
            columns = self.model.columns(),
            "sampling started"
        );

        let streams = chain_streams(settings.seed, settings.chains);
        let model = self.model;
        let chains: Vec<ChainOutput> = pool.install(|| {
            streams
                .into_par_iter()
                .enumerate()
                .map(|(k, mut rng)| {
                    let state = match inits {
                        Some(inits) => ChainState::from_init(model, &inits[k], &mut rng),
                        None => ChainState::dispersed(model, &mut rng),
                    };
                    Chain::new(model, k, state, rng, settings).run(
                        settings.warmup,
                        settings.draws,
                        token,
                    )
                })
                .collect()
        });

        let run = SamplerRun {
            rows: model.rows(),
            columns: model.columns(),
            precincts: model.precincts(),
            requested_draws: settings.draws,
            chains,
        };
        if run.is_cancelled() {
            tracing::warn!(
                completed = run.completed_draws(),
                requested = settings.draws,
                "sampling cancelled"
            );
        } else {
            tracing::info!(
                draws = run.total_draws(),
                divergent = run.divergent_draws(),
                "sampling finished"
            );
        }
        Ok(run)
    }
}

/// One generator per chain: chain `k` is the seeded stream advanced by `k`
/// jumps of 2^128 steps, so streams never overlap.
fn chain_streams(seed: u64, chains: usize) -> Vec<Xoshiro256PlusPlus> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut streams = Vec::with_capacity(chains);
    for _ in 0..chains {
        streams.push(rng.clone());
        rng.jump();
    }
    streams
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn test_chain_streams_differ() {
        let mut streams = chain_streams(7, 3);
        let firsts: Vec<u64> = streams.iter_mut().map(|s| s.next_u64()).collect();
        assert_ne!(firsts[0], firsts[1]);
        assert_ne!(firsts[1], firsts[2]);
        let again: Vec<u64> = chain_streams(7, 3).iter_mut().map(|s| s.next_u64()).collect();
        assert_eq!(firsts, again);
    }

    #[test]
    fn test_settings_from_default_config() {
        let s = SamplerSettings::default();
        assert_eq!(s.draws, 1000);
        assert_eq!(s.warmup, 1000);
        assert_eq!(s.chains, 4);
        assert_eq!(s.seed, 0);
        assert_eq!(s.threads, None);
        assert_eq!(s.target_accept, 0.8);
        assert_eq!(s.max_tree_depth, 10);
    }
}

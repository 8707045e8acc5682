//! Sampler configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CHAINS, DEFAULT_DRAWS, DEFAULT_MAX_DIVERGENCE_RATE, DEFAULT_MAX_TREE_DEPTH,
    DEFAULT_SEED, DEFAULT_TARGET_ACCEPT, DEFAULT_WARMUP,
};

/// Configuration for the posterior sampler.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    /// Retained draws per chain. Default: 1000.
    pub draws: Option<usize>,
    /// Warm-up iterations discarded per chain. Default: 1000.
    pub warmup: Option<usize>,
    /// Independent chains. Default: 4.
    pub chains: Option<usize>,
    /// Random seed. Default: 0.
    pub seed: Option<u64>,
    /// Worker threads for chains (None = rayon default).
    pub threads: Option<usize>,
    /// Wall-clock budget for the whole run, in seconds.
    pub time_budget_secs: Option<u64>,
    /// Maximum fraction of divergent draws. Default: 0.05.
    pub max_divergence_rate: Option<f64>,
    /// Mean acceptance statistic targeted by step-size adaptation, in
    /// (0, 1). Default: 0.8.
    pub target_accept: Option<f64>,
    /// Maximum trajectory doublings per transition. Default: 10.
    pub max_tree_depth: Option<usize>,
}

impl SamplerConfig {
    pub fn effective_draws(&self) -> usize {
        self.draws.unwrap_or(DEFAULT_DRAWS)
    }

    pub fn effective_warmup(&self) -> usize {
        self.warmup.unwrap_or(DEFAULT_WARMUP)
    }

    pub fn effective_chains(&self) -> usize {
        self.chains.unwrap_or(DEFAULT_CHAINS)
    }

    pub fn effective_seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn effective_max_divergence_rate(&self) -> f64 {
        self.max_divergence_rate
            .unwrap_or(DEFAULT_MAX_DIVERGENCE_RATE)
    }

    pub fn effective_target_accept(&self) -> f64 {
        self.target_accept.unwrap_or(DEFAULT_TARGET_ACCEPT)
    }

    pub fn effective_max_tree_depth(&self) -> usize {
        self.max_tree_depth.unwrap_or(DEFAULT_MAX_TREE_DEPTH)
    }
}

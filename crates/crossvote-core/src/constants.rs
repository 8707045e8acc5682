//! Shared constants for the crossvote engine.

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of retained draws per chain.
pub const DEFAULT_DRAWS: usize = 1000;

/// Default number of warm-up iterations discarded per chain.
pub const DEFAULT_WARMUP: usize = 1000;

/// Default number of independent chains.
pub const DEFAULT_CHAINS: usize = 4;

/// Default random seed.
pub const DEFAULT_SEED: u64 = 0;

/// Default split R-hat threshold above which a parameter is non-converged.
pub const DEFAULT_RHAT_THRESHOLD: f64 = 1.05;

/// Default maximum fraction of divergent draws before the run is rejected.
pub const DEFAULT_MAX_DIVERGENCE_RATE: f64 = 0.05;
/// Default mean acceptance statistic the step size is tuned toward.
pub const DEFAULT_TARGET_ACCEPT: f64 = 0.8;
/// Default cap on trajectory doublings per transition.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 10;
/// Largest accepted `max_tree_depth`.
pub const MAX_TREE_DEPTH_LIMIT: usize = 20;

/// Default credible interval mass.
pub const DEFAULT_CREDIBLE_LEVEL: f64 = 0.95;

/// Default shape of the Gamma prior on each row's concentration.
pub const DEFAULT_CONCENTRATION_SHAPE: f64 = 2.0;

/// Default rate of the Gamma prior on each row's concentration.
pub const DEFAULT_CONCENTRATION_RATE: f64 = 0.001;

/// Tolerance for a share vector summing to 1.
pub const DEFAULT_SHARE_TOLERANCE: f64 = 1e-6;

/// Minimum retained draws per chain for diagnostics to run.
pub const MIN_DRAWS_FOR_DIAGNOSTICS: usize = 4;

/// Catch-all category label for untracked choices.
pub const DEFAULT_OTHER_LABEL: &str = "Other";

/// Category label for registered voters who cast no ballot in a contest.
pub const DEFAULT_NO_VOTE_LABEL: &str = "No Vote";

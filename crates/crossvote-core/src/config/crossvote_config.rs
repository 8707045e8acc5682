//! Top-level crossvote configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    CategoryConfig, DiagnosticsConfig, FilterConfig, ModelConfig, SamplerConfig, SummaryConfig,
};
use crate::constants::MAX_TREE_DEPTH_LIMIT;
use crate::errors::ConfigError;

/// Project config file name, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = "crossvote.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`CROSSVOTE_*`)
/// 3. Project config (`crossvote.toml` in project root)
/// 4. User config (`~/.crossvote/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CrossvoteConfig {
    pub sampler: SamplerConfig,
    pub model: ModelConfig,
    pub diagnostics: DiagnosticsConfig,
    pub filter: FilterConfig,
    pub summary: SummaryConfig,
    pub categories: CategoryConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub draws: Option<usize>,
    pub warmup: Option<usize>,
    pub chains: Option<usize>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
    pub time_budget_secs: Option<u64>,
    pub rhat_threshold: Option<f64>,
    pub allow_non_converged: Option<bool>,
}

impl CrossvoteConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Lowest priority: user config. Only parse failures are fatal here.
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    pub fn validate(config: &CrossvoteConfig) -> Result<(), ConfigError> {
        fn fail(field: &str, message: &str) -> Result<(), ConfigError> {
            Err(ConfigError::ValidationFailed {
                field: field.to_string(),
                message: message.to_string(),
            })
        }

        if config.sampler.draws == Some(0) {
            return fail("sampler.draws", "must be greater than 0");
        }
        if let Some(chains) = config.sampler.chains {
            if chains == 0 {
                return fail("sampler.chains", "must be greater than 0");
            }
            if chains < 2 && !config.diagnostics.effective_allow_non_converged() {
                return fail(
                    "sampler.chains",
                    "convergence diagnostics need at least 2 chains",
                );
            }
        }
        if config.sampler.threads == Some(0) {
            return fail("sampler.threads", "must be greater than 0");
        }
        if let Some(rate) = config.sampler.max_divergence_rate {
            if !(0.0..=1.0).contains(&rate) {
                return fail("sampler.max_divergence_rate", "must be between 0.0 and 1.0");
            }
        }
        if let Some(target) = config.sampler.target_accept {
            if !(target > 0.0 && target < 1.0) {
                return fail("sampler.target_accept", "must be strictly between 0.0 and 1.0");
            }
        }
        if let Some(depth) = config.sampler.max_tree_depth {
            if depth == 0 || depth > MAX_TREE_DEPTH_LIMIT {
                return fail(
                    "sampler.max_tree_depth",
                    &format!("must be between 1 and {MAX_TREE_DEPTH_LIMIT}"),
                );
            }
        }
        if let Some(threshold) = config.diagnostics.rhat_threshold {
            if !threshold.is_finite() || threshold <= 1.0 {
                return fail("diagnostics.rhat_threshold", "must be a finite value above 1.0");
            }
        }
        if let Some(min_ess) = config.diagnostics.min_ess {
            if !min_ess.is_finite() || min_ess < 0.0 {
                return fail("diagnostics.min_ess", "must be non-negative");
            }
        }
        if let Some(shape) = config.model.concentration_shape {
            if !shape.is_finite() || shape <= 0.0 {
                return fail("model.concentration_shape", "must be positive");
            }
        }
        if let Some(rate) = config.model.concentration_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return fail("model.concentration_rate", "must be positive");
            }
        }
        if let Some(tol) = config.filter.share_tolerance {
            if !tol.is_finite() || tol <= 0.0 || tol >= 1.0 {
                return fail("filter.share_tolerance", "must be in (0.0, 1.0)");
            }
        }
        if let Some(level) = config.summary.credible_level {
            if !(level > 0.0 && level < 1.0) {
                return fail("summary.credible_level", "must be in (0.0, 1.0)");
            }
        }
        if let Err(e) = config.categories.row_set() {
            return fail("categories.rows", &e.to_string());
        }
        if let Err(e) = config.categories.column_set() {
            return fail("categories.columns", &e.to_string());
        }
        Ok(())
    }

    /// Returns the user config path: `~/.crossvote/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".crossvote").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored (forward-compatible).
    fn merge_toml_file(config: &mut CrossvoteConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: CrossvoteConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`, where `other` values override `base` values
    /// only when `other` has a value.
    fn merge(base: &mut CrossvoteConfig, other: &CrossvoteConfig) {
        fn take<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
            if other.is_some() {
                base.clone_from(other);
            }
        }

        // Sampler
        take(&mut base.sampler.draws, &other.sampler.draws);
        take(&mut base.sampler.warmup, &other.sampler.warmup);
        take(&mut base.sampler.chains, &other.sampler.chains);
        take(&mut base.sampler.seed, &other.sampler.seed);
        take(&mut base.sampler.threads, &other.sampler.threads);
        take(&mut base.sampler.time_budget_secs, &other.sampler.time_budget_secs);
        take(
            &mut base.sampler.max_divergence_rate,
            &other.sampler.max_divergence_rate,
        );
        take(&mut base.sampler.target_accept, &other.sampler.target_accept);
        take(&mut base.sampler.max_tree_depth, &other.sampler.max_tree_depth);

        // Model
        take(
            &mut base.model.concentration_shape,
            &other.model.concentration_shape,
        );
        take(
            &mut base.model.concentration_rate,
            &other.model.concentration_rate,
        );

        // Diagnostics
        take(
            &mut base.diagnostics.rhat_threshold,
            &other.diagnostics.rhat_threshold,
        );
        take(&mut base.diagnostics.min_ess, &other.diagnostics.min_ess);
        take(
            &mut base.diagnostics.monitor_concentration,
            &other.diagnostics.monitor_concentration,
        );
        take(
            &mut base.diagnostics.allow_non_converged,
            &other.diagnostics.allow_non_converged,
        );

        // Filter
        take(
            &mut base.filter.share_tolerance,
            &other.filter.share_tolerance,
        );
        take(
            &mut base.filter.degenerate_policy,
            &other.filter.degenerate_policy,
        );

        // Summary
        take(
            &mut base.summary.credible_level,
            &other.summary.credible_level,
        );
        take(&mut base.summary.level, &other.summary.level);

        // Categories
        if !other.categories.rows.is_empty() {
            base.categories.rows = other.categories.rows.clone();
        }
        if !other.categories.columns.is_empty() {
            base.categories.columns = other.categories.columns.clone();
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `CROSSVOTE_SAMPLER_DRAWS`, `CROSSVOTE_DIAGNOSTICS_RHAT_THRESHOLD`, etc.
    fn apply_env_overrides(config: &mut CrossvoteConfig) {
        fn env<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = env("CROSSVOTE_SAMPLER_DRAWS") {
            config.sampler.draws = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_WARMUP") {
            config.sampler.warmup = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_CHAINS") {
            config.sampler.chains = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_SEED") {
            config.sampler.seed = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_THREADS") {
            config.sampler.threads = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_TIME_BUDGET_SECS") {
            config.sampler.time_budget_secs = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_TARGET_ACCEPT") {
            config.sampler.target_accept = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_SAMPLER_MAX_TREE_DEPTH") {
            config.sampler.max_tree_depth = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_DIAGNOSTICS_RHAT_THRESHOLD") {
            config.diagnostics.rhat_threshold = Some(v);
        }
        if let Some(v) = env("CROSSVOTE_DIAGNOSTICS_ALLOW_NON_CONVERGED") {
            config.diagnostics.allow_non_converged = Some(v);
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut CrossvoteConfig, cli: &CliOverrides) {
        if let Some(v) = cli.draws {
            config.sampler.draws = Some(v);
        }
        if let Some(v) = cli.warmup {
            config.sampler.warmup = Some(v);
        }
        if let Some(v) = cli.chains {
            config.sampler.chains = Some(v);
        }
        if let Some(v) = cli.seed {
            config.sampler.seed = Some(v);
        }
        if let Some(v) = cli.threads {
            config.sampler.threads = Some(v);
        }
        if let Some(v) = cli.time_budget_secs {
            config.sampler.time_budget_secs = Some(v);
        }
        if let Some(v) = cli.rhat_threshold {
            config.diagnostics.rhat_threshold = Some(v);
        }
        if let Some(v) = cli.allow_non_converged {
            config.diagnostics.allow_non_converged = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

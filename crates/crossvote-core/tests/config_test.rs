//! Tests for the crossvote configuration system.

use std::sync::Mutex;

use crossvote_core::config::{
    CliOverrides, CrossvoteConfig, DegeneratePolicy, EstimateLevel,
};
use crossvote_core::errors::ConfigError;

/// Global mutex to serialize tests that modify environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn tempdir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Clear all CROSSVOTE_ env vars to prevent cross-test contamination.
fn clear_env_vars() {
    for key in [
        "CROSSVOTE_SAMPLER_DRAWS",
        "CROSSVOTE_SAMPLER_WARMUP",
        "CROSSVOTE_SAMPLER_CHAINS",
        "CROSSVOTE_SAMPLER_SEED",
        "CROSSVOTE_SAMPLER_THREADS",
        "CROSSVOTE_SAMPLER_TIME_BUDGET_SECS",
        "CROSSVOTE_SAMPLER_TARGET_ACCEPT",
        "CROSSVOTE_SAMPLER_MAX_TREE_DEPTH",
        "CROSSVOTE_DIAGNOSTICS_RHAT_THRESHOLD",
        "CROSSVOTE_DIAGNOSTICS_ALLOW_NON_CONVERGED",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn test_layered_resolution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env_vars();

    let dir = tempdir();
    std::fs::write(
        dir.path().join("crossvote.toml"),
        r#"
[sampler]
draws = 2000
warmup = 500
seed = 7

[diagnostics]
rhat_threshold = 1.1
"#,
    )
    .unwrap();

    std::env::set_var("CROSSVOTE_SAMPLER_DRAWS", "3000");

    let cli = CliOverrides {
        seed: Some(99),
        ..Default::default()
    };

    let config = CrossvoteConfig::load(dir.path(), Some(&cli)).unwrap();

    // Env beats project.
    assert_eq!(config.sampler.draws, Some(3000));
    // CLI beats project.
    assert_eq!(config.sampler.seed, Some(99));
    // Project beats defaults.
    assert_eq!(config.sampler.warmup, Some(500));
    assert_eq!(config.diagnostics.effective_rhat_threshold(), 1.1);

    clear_env_vars();
}

#[test]
fn test_load_missing_files_fallback() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env_vars();

    let dir = tempdir();
    let config = CrossvoteConfig::load(dir.path(), None).unwrap();

    assert_eq!(config.sampler.effective_draws(), 1000);
    assert_eq!(config.sampler.effective_warmup(), 1000);
    assert_eq!(config.sampler.effective_chains(), 4);
    assert_eq!(config.sampler.effective_seed(), 0);
    assert_eq!(config.sampler.effective_max_divergence_rate(), 0.05);
    assert_eq!(config.diagnostics.effective_rhat_threshold(), 1.05);
    assert!(!config.diagnostics.effective_allow_non_converged());
    assert_eq!(config.model.effective_concentration_shape(), 2.0);
    assert_eq!(config.model.effective_concentration_rate(), 0.001);
    assert_eq!(config.filter.effective_share_tolerance(), 1e-6);
    assert_eq!(
        config.filter.effective_degenerate_policy(),
        DegeneratePolicy::Exclude
    );
    assert_eq!(config.summary.effective_credible_level(), 0.95);
    assert_eq!(config.summary.effective_level(), EstimateLevel::District);
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env_vars();

    let dir = tempdir();
    std::fs::write(dir.path().join("crossvote.toml"), "[sampler\ndraws = ").unwrap();
    let err = CrossvoteConfig::load(dir.path(), None).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn test_validation_rejects_bad_values() {
    let cases = [
        ("[sampler]\ndraws = 0", "sampler.draws"),
        ("[sampler]\nchains = 1", "sampler.chains"),
        ("[sampler]\nmax_divergence_rate = 1.5", "sampler.max_divergence_rate"),
        ("[sampler]\ntarget_accept = 1.0", "sampler.target_accept"),
        ("[sampler]\nmax_tree_depth = 0", "sampler.max_tree_depth"),
        ("[sampler]\nmax_tree_depth = 40", "sampler.max_tree_depth"),
        ("[diagnostics]\nrhat_threshold = 0.99", "diagnostics.rhat_threshold"),
        ("[model]\nconcentration_rate = -1.0", "model.concentration_rate"),
        ("[summary]\ncredible_level = 1.0", "summary.credible_level"),
        ("[categories]\nrows = [\"a\", \"a\"]", "categories.rows"),
    ];
    for (toml_str, expected_field) in cases {
        let config = CrossvoteConfig::from_toml(toml_str).unwrap();
        match CrossvoteConfig::validate(&config) {
            Err(ConfigError::ValidationFailed { field, .. }) => {
                assert_eq!(field, expected_field, "for input {toml_str:?}")
            }
            other => panic!("expected validation failure for {toml_str:?}, got {other:?}"),
        }
    }
}

#[test]
fn test_single_chain_allowed_when_non_converged_accepted() {
    let config = CrossvoteConfig::from_toml(
        "[sampler]\nchains = 1\n[diagnostics]\nallow_non_converged = true",
    )
    .unwrap();
    assert!(CrossvoteConfig::validate(&config).is_ok());
}

#[test]
fn test_enum_fields_parse_lowercase() {
    let config = CrossvoteConfig::from_toml(
        "[filter]\ndegenerate_policy = \"reject\"\n[summary]\nlevel = \"global\"",
    )
    .unwrap();
    assert_eq!(
        config.filter.effective_degenerate_policy(),
        DegeneratePolicy::Reject
    );
    assert_eq!(config.summary.effective_level(), EstimateLevel::Global);
}

#[test]
fn test_toml_round_trip() {
    let config = CrossvoteConfig::from_toml(
        r#"
[sampler]
draws = 250
chains = 3

[categories]
rows = ["Stein", "Robinson", "Other", "No Vote"]
columns = ["Trump", "Harris", "Other", "No Vote"]
"#,
    )
    .unwrap();
    let text = config.to_toml().unwrap();
    let back = CrossvoteConfig::from_toml(&text).unwrap();
    assert_eq!(config, back);
    assert_eq!(back.categories.row_set().unwrap().unwrap().len(), 4);
}

#[test]
fn test_unknown_keys_ignored() {
    let config = CrossvoteConfig::from_toml("[sampler]\ndraws = 10\nfuture_knob = true").unwrap();
    assert_eq!(config.sampler.draws, Some(10));
}

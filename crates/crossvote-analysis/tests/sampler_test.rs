//! Posterior sampler: determinism, validation, cancellation, draw shape.

use crossvote_analysis::diagnostics::ConvergenceDiagnostics;
use crossvote_analysis::model::HierarchicalModel;
use crossvote_analysis::sampler::{ChainInit, Sampler, SamplerSettings};
use crossvote_core::config::ModelConfig;
use crossvote_core::errors::{DiagnosticsError, SamplerError};
use crossvote_core::traits::{Cancellable, CancellationToken};
use crossvote_core::types::{Precinct, PrecinctSet};

fn three_precincts() -> PrecinctSet {
    PrecinctSet::new(vec![
        Precinct {
            id: "P1".into(),
            population: 1000,
            row_shares: vec![0.5, 0.5],
            column_shares: vec![0.55, 0.45],
        },
        Precinct {
            id: "P2".into(),
            population: 500,
            row_shares: vec![0.8, 0.2],
            column_shares: vec![0.76, 0.24],
        },
        Precinct {
            id: "P3".into(),
            population: 800,
            row_shares: vec![0.2, 0.8],
            column_shares: vec![0.34, 0.66],
        },
    ])
    .unwrap()
}

fn settings(draws: usize, warmup: usize, chains: usize, seed: u64) -> SamplerSettings {
    SamplerSettings {
        draws,
        warmup,
        chains,
        seed,
        ..SamplerSettings::default()
    }
}

#[test]
fn same_seed_same_draws() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let token = CancellationToken::new();

    let a = Sampler::new(&model, settings(50, 50, 3, 42)).run(&token).unwrap();
    let b = Sampler::new(&model, settings(50, 50, 3, 42)).run(&token).unwrap();
    let c = Sampler::new(&model, settings(50, 50, 3, 43)).run(&token).unwrap();

    for (x, y) in a.chains.iter().zip(&b.chains) {
        assert_eq!(x.draws, y.draws);
        assert_eq!(x.precinct_sums, y.precinct_sums);
    }
    assert_ne!(a.chains[0].draws, c.chains[0].draws);
}

#[test]
fn thread_count_does_not_change_results() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let token = CancellationToken::new();

    let mut one = settings(30, 30, 4, 7);
    one.threads = Some(1);
    let mut four = settings(30, 30, 4, 7);
    four.threads = Some(4);

    let a = Sampler::new(&model, one).run(&token).unwrap();
    let b = Sampler::new(&model, four).run(&token).unwrap();
    for (x, y) in a.chains.iter().zip(&b.chains) {
        assert_eq!(x.chain, y.chain);
        assert_eq!(x.draws, y.draws);
    }
}

#[test]
fn draws_are_valid_matrices() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let run = Sampler::new(&model, settings(40, 40, 2, 1))
        .run(&CancellationToken::new())
        .unwrap();

    assert_eq!(run.chains.len(), 2);
    assert_eq!(run.total_draws(), 80);
    assert!(!run.is_cancelled());
    for draw in run.draws() {
        for matrix in [&draw.typical, &draw.precinct_mean, &draw.district] {
            for row in matrix.chunks(2) {
                assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
                assert!(row.iter().all(|v| *v >= 0.0 && *v <= 1.0));
            }
        }
        assert_eq!(draw.log_concentration.len(), 2);
        assert!(draw.log_density.is_finite());
    }
    for row in run.precinct_means().chunks(2) {
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn single_column_rejected() {
    let data = PrecinctSet::new(vec![Precinct {
        id: "P1".into(),
        population: 10,
        row_shares: vec![0.5, 0.5],
        column_shares: vec![1.0],
    }])
    .unwrap();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let err = Sampler::new(&model, settings(10, 10, 2, 0))
        .run(&CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SamplerError::InvalidSettings(_)));
}

#[test]
fn zero_draws_rejected() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let err = Sampler::new(&model, settings(0, 10, 2, 0))
        .run(&CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SamplerError::InvalidSettings(_)));
}

#[test]
fn cancelled_token_stops_before_first_draw() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let token = CancellationToken::new();
    token.cancel();
    let run = Sampler::new(&model, settings(100, 100, 2, 0)).run(&token).unwrap();
    assert!(run.is_cancelled());
    assert_eq!(run.completed_draws(), 0);
    assert_eq!(run.requested_draws, 100);
}

#[test]
fn explicit_inits_validated() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let sampler = Sampler::new(&model, settings(10, 0, 2, 0));
    let good = ChainInit {
        typical: vec![vec![0.9, 0.1], vec![0.2, 0.8]],
        concentration: vec![100.0, 100.0],
    };
    let bad = ChainInit {
        typical: vec![vec![0.9, 0.2], vec![0.2, 0.8]],
        concentration: vec![100.0, 100.0],
    };
    let token = CancellationToken::new();

    assert!(sampler.run_with_inits(&[good.clone()], &token).is_err());
    assert!(sampler
        .run_with_inits(&[good.clone(), bad], &token)
        .is_err());
    let run = sampler
        .run_with_inits(&[good.clone(), good], &token)
        .unwrap();
    assert_eq!(run.total_draws(), 20);
}

#[test]
fn opposite_starts_without_warmup_fail_diagnostics() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let mut crawl = settings(10, 0, 2, 3);
    crawl.max_tree_depth = 1;
    let start = |typical: [f64; 2]| ChainInit {
        typical: vec![typical.to_vec(), typical.to_vec()],
        concentration: vec![100.0, 100.0],
    };
    let inits = [start([0.9, 0.1]), start([0.1, 0.9])];
    let run = Sampler::new(&model, crawl)
        .run_with_inits(&inits, &CancellationToken::new())
        .unwrap();
    assert_eq!(run.total_draws(), 20);
    assert!(run.chains.iter().all(|c| c.stats.mean_tree_depth <= 1.0));

    let report = ConvergenceDiagnostics::default().evaluate(&run).unwrap();
    assert!(!report.passed, "max R-hat {}", report.max_rhat());
    assert!(report.max_rhat() > 1.05);
    assert!(matches!(
        report.require_converged(),
        Err(DiagnosticsError::NonConvergence { .. })
    ));
}

#[test]
fn invalid_nuts_settings_rejected() {
    let data = three_precincts();
    let model = HierarchicalModel::new(&data, &ModelConfig::default());
    let token = CancellationToken::new();

    let mut no_depth = settings(10, 10, 2, 0);
    no_depth.max_tree_depth = 0;
    let err = Sampler::new(&model, no_depth).run(&token).unwrap_err();
    assert!(matches!(err, SamplerError::InvalidSettings(_)));

    let mut always_accept = settings(10, 10, 2, 0);
    always_accept.target_accept = 1.0;
    let err = Sampler::new(&model, always_accept).run(&token).unwrap_err();
    assert!(matches!(err, SamplerError::InvalidSettings(_)));
}

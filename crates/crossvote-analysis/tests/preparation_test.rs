//! Data preparation: chunked aggregation, contest tallies and the precinct
//! filter, end to end.

use crossvote_analysis::preparation::*;
use crossvote_core::config::{DegeneratePolicy, FilterConfig};
use crossvote_core::errors::InputError;
use proptest::prelude::*;

fn normalized(raw: &[f64]) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.iter().map(|v| v / total).collect()
    } else {
        raw.to_vec()
    }
}

#[test]
fn contest_to_dataset() {
    let president = ContestSpec::new(["Trump", "Harris"]);
    let senate = ContestSpec::new(["Budd", "Beasley"]);

    let registered: KeyedAggregate<u64> =
        [("P1", 100u64), ("P2", 200), ("P3", 50)].into_iter().collect();
    let rows = president.shares(
        &registered,
        &president.tally([
            VoteRecord::new("P1", "Trump", 40),
            VoteRecord::new("P1", "Harris", 40),
            VoteRecord::new("P2", "Trump", 100),
            VoteRecord::new("P2", "West", 20),
            VoteRecord::new("P3", "Trump", 60),
        ]),
    );
    let columns = senate.shares(
        &registered,
        &senate.tally([
            VoteRecord::new("P1", "Budd", 30),
            VoteRecord::new("P1", "Beasley", 45),
            VoteRecord::new("P2", "Budd", 110),
            VoteRecord::new("P3", "Beasley", 10),
        ]),
    );

    let (set, report) = PrecinctFilter::default()
        .apply(&registered, &rows, &columns)
        .unwrap();

    // P3 cast more presidential ballots than it has registered voters.
    assert_eq!(set.len(), 2);
    assert_eq!(set.rows(), 4);
    assert_eq!(set.columns(), 4);
    assert!(report
        .excluded
        .iter()
        .any(|(k, r)| k == "P3" && matches!(r, ExclusionReason::NegativeShare { side: "row", .. })));

    let p2 = &set.precincts()[1];
    assert_eq!(p2.id, "P2");
    assert_eq!(p2.population, 200);
    assert_eq!(p2.row_shares, vec![0.5, 0.0, 0.1, 0.4]);
    assert_eq!(p2.column_shares, vec![0.55, 0.0, 0.0, 0.45]);
}

#[test]
fn reject_policy_surfaces_inconsistent_sources() {
    let spec = ContestSpec::new(["A"]);
    let registered: KeyedAggregate<u64> = [("P1", 10u64), ("P2", 10)].into_iter().collect();
    let tally = spec.tally([VoteRecord::new("P1", "A", 5), VoteRecord::new("P2", "A", 50)]);
    let shares = spec.shares(&registered, &tally);

    let filter = PrecinctFilter::from_config(&FilterConfig {
        degenerate_policy: Some(DegeneratePolicy::Reject),
        ..Default::default()
    });
    let err = filter.apply(&registered, &shares, &shares).unwrap_err();
    assert!(matches!(err, InputError::DegenerateInput { ref precinct, .. } if precinct == "P2"));
}

proptest! {
    #[test]
    fn chunking_does_not_change_totals(
        records in proptest::collection::vec((0u8..6, 0u64..1000), 0..60),
        chunk_size in 1usize..10,
    ) {
        let whole: KeyedAggregate<u64> = records
            .iter()
            .map(|(k, v)| (format!("P{k}"), *v))
            .collect();
        let chunked = KeyedAggregate::fold_chunks(records.chunks(chunk_size).map(|chunk| {
            chunk
                .iter()
                .map(|(k, v)| (format!("P{k}"), *v))
                .collect::<KeyedAggregate<u64>>()
        }));
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn filter_retains_only_usable_precincts(
        entries in proptest::collection::vec(
            (
                proptest::option::of(0u64..5),
                proptest::option::of(proptest::collection::vec(0.0f64..1.0, 3)),
                proptest::option::of(proptest::collection::vec(0.0f64..1.0, 2)),
            ),
            1..20,
        ),
    ) {
        let mut populations = KeyedAggregate::<u64>::new();
        let mut rows = ShareTable::new(3);
        let mut columns = ShareTable::new(2);
        for (i, (pop, row, col)) in entries.iter().enumerate() {
            let key = format!("P{i:02}");
            if let Some(n) = pop {
                populations.add(key.clone(), *n);
            }
            if let Some(r) = row {
                rows.insert(key.clone(), normalized(r));
            }
            if let Some(c) = col {
                columns.insert(key, normalized(c));
            }
        }

        match PrecinctFilter::default().apply(&populations, &rows, &columns) {
            Ok((set, report)) => {
                prop_assert!(!set.is_empty());
                prop_assert_eq!(report.retained, set.len());
                for p in set.precincts() {
                    prop_assert!(p.population > 0);
                    prop_assert_eq!(populations.get(&p.id), Some(&p.population));
                    prop_assert!(rows.get(&p.id).is_some());
                    prop_assert!(columns.get(&p.id).is_some());
                    let row_sum: f64 = p.row_shares.iter().sum();
                    let col_sum: f64 = p.column_shares.iter().sum();
                    prop_assert!((row_sum - 1.0).abs() < 1e-6);
                    prop_assert!((col_sum - 1.0).abs() < 1e-6);
                    prop_assert!(p.row_shares.iter().chain(&p.column_shares).all(|s| s.is_finite() && *s >= 0.0));
                }
                // Every key seen in either share source is accounted for once.
                let mut keys: Vec<&str> = rows.iter().map(|(k, _)| k).collect();
                keys.extend(columns.iter().map(|(k, _)| k).filter(|k| rows.get(k).is_none()));
                prop_assert_eq!(keys.len(), set.len() + report.excluded.len());
            }
            Err(InputError::EmptyDataset { .. }) => {
                let usable = entries.iter().any(|(pop, row, col)| {
                    matches!(pop, Some(n) if *n > 0)
                        && matches!(row, Some(r) if r.iter().sum::<f64>() > 0.0)
                        && matches!(col, Some(c) if c.iter().sum::<f64>() > 0.0)
                });
                prop_assert!(!usable);
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }
}

//! Contest tallies: map raw choices onto a fixed category set, derive
//! abstentions from registration counts, and normalize to shares.

use std::collections::BTreeMap;

use crossvote_core::constants::{DEFAULT_NO_VOTE_LABEL, DEFAULT_OTHER_LABEL};
use crossvote_core::errors::InputError;
use crossvote_core::types::CategorySet;

use super::aggregate::KeyedAggregate;

/// One precinct/choice vote total from a results file.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteRecord {
    pub precinct: String,
    pub choice: String,
    pub votes: u64,
}

impl VoteRecord {
    pub fn new(precinct: impl Into<String>, choice: impl Into<String>, votes: u64) -> Self {
        Self {
            precinct: precinct.into(),
            choice: choice.into(),
            votes,
        }
    }
}

/// Per-precinct share vectors of a fixed width, keyed by precinct.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareTable {
    width: usize,
    rows: BTreeMap<String, Vec<f64>>,
}

impl ShareTable {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: BTreeMap::new(),
        }
    }

    /// Insert a share vector. Width is checked by the filter, not here, so
    /// malformed rows can be reported per precinct.
    pub fn insert(&mut self, key: impl Into<String>, shares: Vec<f64>) {
        self.rows.insert(key.into(), shares);
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// How one contest's choices collapse into categories: the tracked
/// choices in order, then a catch-all, then abstentions.
#[derive(Debug, Clone, PartialEq)]
pub struct ContestSpec {
    tracked: Vec<String>,
    other_label: String,
    no_vote_label: String,
}

impl ContestSpec {
    /// Spec with the default "Other" and "No Vote" labels.
    pub fn new<I, S>(tracked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracked: tracked.into_iter().map(Into::into).collect(),
            other_label: DEFAULT_OTHER_LABEL.to_string(),
            no_vote_label: DEFAULT_NO_VOTE_LABEL.to_string(),
        }
    }

    pub fn with_labels(mut self, other: impl Into<String>, no_vote: impl Into<String>) -> Self {
        self.other_label = other.into();
        self.no_vote_label = no_vote.into();
        self
    }

    /// Number of categories: tracked, catch-all, abstention.
    pub fn width(&self) -> usize {
        self.tracked.len() + 2
    }

    fn other_index(&self) -> usize {
        self.tracked.len()
    }

    /// The category labels in matrix order.
    pub fn categories(&self) -> Result<CategorySet, InputError> {
        CategorySet::new(
            self.tracked
                .iter()
                .cloned()
                .chain([self.other_label.clone(), self.no_vote_label.clone()]),
        )
    }

    /// Fold vote records into per-precinct ballot counts (tracked + catch-all).
    pub fn tally<I>(&self, records: I) -> KeyedAggregate<Vec<f64>>
    where
        I: IntoIterator<Item = VoteRecord>,
    {
        let cast_width = self.tracked.len() + 1;
        let mut tally = KeyedAggregate::new();
        for record in records {
            let idx = self
                .tracked
                .iter()
                .position(|t| *t == record.choice)
                .unwrap_or_else(|| self.other_index());
            let mut counts = vec![0.0; cast_width];
            counts[idx] = record.votes as f64;
            tally.add(record.precinct, counts);
        }
        tally
    }

    /// Join ballot counts with registration counts and normalize.
    ///
    /// Abstentions are registered minus ballots cast. A negative result
    /// (the two sources disagree about the precinct) is kept as-is so the
    /// filter excludes the precinct instead of silently clipping it.
    /// Precincts with no ballots cast are dropped.
    pub fn shares(
        &self,
        registered: &KeyedAggregate<u64>,
        tally: &KeyedAggregate<Vec<f64>>,
    ) -> ShareTable {
        let cast_width = self.tracked.len() + 1;
        let mut table = ShareTable::new(self.width());
        for (key, cast) in tally.iter() {
            let Some(&reg) = registered.get(key) else {
                continue;
            };
            let cast_total: f64 = cast.iter().take(cast_width).sum();
            if cast_total <= 0.0 {
                tracing::debug!(precinct = key, "dropping precinct with no ballots cast");
                continue;
            }
            let population = reg as f64;
            let mut counts: Vec<f64> = (0..cast_width)
                .map(|i| cast.get(i).copied().unwrap_or(0.0))
                .collect();
            counts.push(population - cast_total);
            let shares = if population > 0.0 {
                counts.iter().map(|c| c / population).collect()
            } else {
                vec![0.0; counts.len()]
            };
            table.insert(key, shares);
        }
        table
    }
}

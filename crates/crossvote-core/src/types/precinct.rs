//! Precincts and the filtered precinct set consumed by the model.

use serde::{Deserialize, Serialize};

use crate::errors::InputError;

/// One precinct that survived filtering.
///
/// Immutable once built: both share vectors are finite, non-negative and
/// sum to 1 within tolerance, and `population > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precinct {
    pub id: String,
    pub population: u64,
    pub row_shares: Vec<f64>,
    pub column_shares: Vec<f64>,
}

impl Precinct {
    /// Expected voter count for each row category.
    pub fn row_counts(&self) -> impl Iterator<Item = f64> + '_ {
        let n = self.population as f64;
        self.row_shares.iter().map(move |s| s * n)
    }

    /// Observed voter count for each column category.
    pub fn column_counts(&self) -> impl Iterator<Item = f64> + '_ {
        let n = self.population as f64;
        self.column_shares.iter().map(move |s| s * n)
    }
}

/// The filtered, validated dataset: every precinct has `rows` row shares
/// and `columns` column shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecinctSet {
    precincts: Vec<Precinct>,
    rows: usize,
    columns: usize,
}

impl PrecinctSet {
    /// Assemble a set, checking that it is non-empty and every precinct has
    /// the same dimensions.
    pub fn new(precincts: Vec<Precinct>) -> Result<Self, InputError> {
        let first = precincts.first().ok_or(InputError::EmptyDataset {
            row_source: 0,
            column_source: 0,
            joined: 0,
            excluded: 0,
        })?;
        let rows = first.row_shares.len();
        let columns = first.column_shares.len();
        if rows == 0 || columns == 0 {
            return Err(InputError::DimensionMismatch {
                what: "category count",
                expected: 1,
                found: 0,
            });
        }
        for p in &precincts {
            if p.row_shares.len() != rows {
                return Err(InputError::DimensionMismatch {
                    what: "row share width",
                    expected: rows,
                    found: p.row_shares.len(),
                });
            }
            if p.column_shares.len() != columns {
                return Err(InputError::DimensionMismatch {
                    what: "column share width",
                    expected: columns,
                    found: p.column_shares.len(),
                });
            }
        }
        Ok(Self {
            precincts,
            rows,
            columns,
        })
    }

    pub fn precincts(&self) -> &[Precinct] {
        &self.precincts
    }

    pub fn len(&self) -> usize {
        self.precincts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precincts.is_empty()
    }

    /// Number of row categories (R).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of column categories (C).
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Total population across precincts.
    pub fn total_population(&self) -> u64 {
        self.precincts.iter().map(|p| p.population).sum()
    }
}

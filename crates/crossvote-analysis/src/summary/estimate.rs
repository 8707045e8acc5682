//! Labeled posterior estimates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crossvote_core::config::EstimateLevel;
use crossvote_core::types::CategorySet;

/// Posterior summary of one transition-matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellEstimate {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Labeled R x C posterior-mean transition matrix with equal-tailed
/// credible intervals. Matrices are row-major `[r * C + c]`; each row of
/// `mean` sums to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorEstimate {
    pub level: EstimateLevel,
    pub rows: CategorySet,
    pub columns: CategorySet,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub credible_level: f64,
    /// Retained draws the estimate was computed from.
    pub draws: usize,
}

impl PosteriorEstimate {
    pub fn mean_at(&self, r: usize, c: usize) -> f64 {
        self.mean[r * self.columns.len() + c]
    }

    pub fn interval_at(&self, r: usize, c: usize) -> (f64, f64) {
        let i = r * self.columns.len() + c;
        (self.lower[i], self.upper[i])
    }

    /// Mean preference vector of row category `r`.
    pub fn row(&self, r: usize) -> &[f64] {
        let c_n = self.columns.len();
        &self.mean[r * c_n..(r + 1) * c_n]
    }

    /// Cell lookup by labels.
    pub fn cell(&self, row: &str, column: &str) -> Option<CellEstimate> {
        let r = self.rows.index_of(row)?;
        let c = self.columns.index_of(column)?;
        let (lower, upper) = self.interval_at(r, c);
        Some(CellEstimate {
            mean: self.mean_at(r, c),
            lower,
            upper,
        })
    }

    /// Mean matrix as nested rows.
    pub fn to_matrix(&self) -> Vec<Vec<f64>> {
        (0..self.rows.len()).map(|r| self.row(r).to_vec()).collect()
    }

    /// Sum of absolute cell differences against a reference matrix of the
    /// same shape.
    pub fn l1_distance(&self, reference: &[Vec<f64>]) -> f64 {
        reference
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, v)| (r, c, *v)))
            .map(|(r, c, v)| (self.mean_at(r, c) - v).abs())
            .sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for PosteriorEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .labels()
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0);
        write!(f, "{:width$}", "")?;
        for (_, label) in self.columns.iter() {
            write!(f, "  {label:>12}")?;
        }
        writeln!(f)?;
        for (r, label) in self.rows.iter() {
            write!(f, "{label:width$}")?;
            for c in 0..self.columns.len() {
                write!(f, "  {:>12.4}", self.mean_at(r, c))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Posterior mean preference matrix of one precinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecinctPreference {
    pub precinct: String,
    /// Row-major `[r * C + c]`.
    pub mean: Vec<f64>,
}

//! Precinct filter: inner join of the population and share sources, with
//! degenerate precincts excluded (or rejected) before any sampling.

use std::fmt;

use crossvote_core::config::{DegeneratePolicy, FilterConfig};
use crossvote_core::errors::InputError;
use crossvote_core::types::{Precinct, PrecinctSet};

use super::aggregate::KeyedAggregate;
use super::contest::ShareTable;

/// Why a precinct was left out of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    MissingPopulation,
    MissingRowShares,
    MissingColumnShares,
    ZeroPopulation,
    ZeroShareTotal { side: &'static str },
    NonFiniteShare { side: &'static str, index: usize },
    NegativeShare { side: &'static str, index: usize, value: f64 },
    WrongWidth { side: &'static str, expected: usize, found: usize },
}

impl ExclusionReason {
    /// True for reasons that `DegeneratePolicy::Reject` turns into errors.
    fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::NonFiniteShare { .. } | Self::NegativeShare { .. } | Self::WrongWidth { .. }
        )
    }

    fn side(&self) -> &'static str {
        match self {
            Self::ZeroShareTotal { side }
            | Self::NonFiniteShare { side, .. }
            | Self::NegativeShare { side, .. }
            | Self::WrongWidth { side, .. } => side,
            Self::MissingRowShares => "row",
            Self::MissingColumnShares => "column",
            Self::MissingPopulation | Self::ZeroPopulation => "population",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPopulation => f.write_str("no population count"),
            Self::MissingRowShares => f.write_str("absent from row source"),
            Self::MissingColumnShares => f.write_str("absent from column source"),
            Self::ZeroPopulation => f.write_str("population is zero"),
            Self::ZeroShareTotal { side } => write!(f, "{side} shares sum to zero"),
            Self::NonFiniteShare { side, index } => {
                write!(f, "{side} share {index} is not finite")
            }
            Self::NegativeShare { side, index, value } => {
                write!(f, "{side} share {index} is negative ({value})")
            }
            Self::WrongWidth {
                side,
                expected,
                found,
            } => write!(f, "{side} shares have width {found}, expected {expected}"),
        }
    }
}

/// Which precincts were dropped and why.
#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub row_source: usize,
    pub column_source: usize,
    pub retained: usize,
    pub excluded: Vec<(String, ExclusionReason)>,
}

impl FilterReport {
    /// Number of precincts excluded for a reason matching `pred`.
    pub fn count_where(&self, pred: impl Fn(&ExclusionReason) -> bool) -> usize {
        self.excluded.iter().filter(|(_, r)| pred(r)).count()
    }
}

/// Joins and validates precinct sources into a `PrecinctSet`.
#[derive(Debug, Clone)]
pub struct PrecinctFilter {
    tolerance: f64,
    policy: DegeneratePolicy,
}

impl Default for PrecinctFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

impl PrecinctFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            tolerance: config.effective_share_tolerance(),
            policy: config.effective_degenerate_policy(),
        }
    }

    pub fn with_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inner-join the three sources on precinct key and keep only precincts
    /// the model can use.
    ///
    /// Fails with `DegenerateInput` when a surviving vector does not sum to 1
    /// (or, under `Reject`, on any degenerate vector) and with `EmptyDataset`
    /// when nothing survives.
    pub fn apply(
        &self,
        populations: &KeyedAggregate<u64>,
        rows: &ShareTable,
        columns: &ShareTable,
    ) -> Result<(PrecinctSet, FilterReport), InputError> {
        let mut report = FilterReport {
            row_source: rows.len(),
            column_source: columns.len(),
            ..Default::default()
        };
        let mut retained = Vec::new();

        for (key, row_shares) in rows.iter() {
            let Some(column_shares) = columns.get(key) else {
                report
                    .excluded
                    .push((key.to_string(), ExclusionReason::MissingColumnShares));
                continue;
            };
            let population = match populations.get(key) {
                None => Err(ExclusionReason::MissingPopulation),
                Some(0) => Err(ExclusionReason::ZeroPopulation),
                Some(&n) => Ok(n),
            };
            let checked = population.and_then(|n| {
                self.check_vector("row", row_shares, rows.width())?;
                self.check_vector("column", column_shares, columns.width())?;
                Ok(n)
            });
            match checked {
                Ok(population) => retained.push(Precinct {
                    id: key.to_string(),
                    population,
                    row_shares: row_shares.to_vec(),
                    column_shares: column_shares.to_vec(),
                }),
                Err(reason) => {
                    if self.policy == DegeneratePolicy::Reject && reason.is_degenerate() {
                        return Err(InputError::DegenerateInput {
                            precinct: key.to_string(),
                            side: reason.side(),
                            message: reason.to_string(),
                        });
                    }
                    report.excluded.push((key.to_string(), reason));
                }
            }
        }
        for (key, _) in columns.iter() {
            if rows.get(key).is_none() {
                report
                    .excluded
                    .push((key.to_string(), ExclusionReason::MissingRowShares));
            }
        }

        for precinct in &retained {
            self.check_sum(&precinct.id, "row", &precinct.row_shares)?;
            self.check_sum(&precinct.id, "column", &precinct.column_shares)?;
        }

        for (key, reason) in &report.excluded {
            if matches!(reason, ExclusionReason::NegativeShare { .. }) {
                tracing::warn!(
                    precinct = %key,
                    %reason,
                    "excluding precinct with inconsistent sources"
                );
            } else {
                tracing::debug!(precinct = %key, %reason, "excluding precinct");
            }
        }

        report.retained = retained.len();
        if retained.is_empty() {
            return Err(InputError::EmptyDataset {
                row_source: report.row_source,
                column_source: report.column_source,
                joined: report.excluded.len()
                    - report.count_where(|r| {
                        matches!(
                            r,
                            ExclusionReason::MissingRowShares
                                | ExclusionReason::MissingColumnShares
                        )
                    }),
                excluded: report.excluded.len(),
            });
        }

        tracing::info!(
            retained = report.retained,
            excluded = report.excluded.len(),
            row_source = report.row_source,
            column_source = report.column_source,
            "precinct filter complete"
        );

        let set = PrecinctSet::new(retained)?;
        Ok((set, report))
    }

    fn check_vector(
        &self,
        side: &'static str,
        shares: &[f64],
        expected: usize,
    ) -> Result<(), ExclusionReason> {
        if shares.len() != expected {
            return Err(ExclusionReason::WrongWidth {
                side,
                expected,
                found: shares.len(),
            });
        }
        if let Some(index) = shares.iter().position(|s| !s.is_finite()) {
            return Err(ExclusionReason::NonFiniteShare { side, index });
        }
        if let Some(index) = shares.iter().position(|s| *s < 0.0) {
            return Err(ExclusionReason::NegativeShare {
                side,
                index,
                value: shares[index],
            });
        }
        if shares.iter().sum::<f64>() <= 0.0 {
            return Err(ExclusionReason::ZeroShareTotal { side });
        }
        Ok(())
    }

    fn check_sum(&self, id: &str, side: &'static str, shares: &[f64]) -> Result<(), InputError> {
        let sum: f64 = shares.iter().sum();
        if (sum - 1.0).abs() > self.tolerance {
            return Err(InputError::DegenerateInput {
                precinct: id.to_string(),
                side,
                message: format!("shares sum to {sum}, expected 1 within {}", self.tolerance),
            });
        }
        Ok(())
    }
}

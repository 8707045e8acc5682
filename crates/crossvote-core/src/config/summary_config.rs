//! Posterior summary configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CREDIBLE_LEVEL;

/// Which transition matrix the summarizer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateLevel {
    /// Unweighted mean of the precinct preference matrices.
    Precinct,
    /// Precinct matrices weighted by each precinct's row-category population.
    #[default]
    District,
    /// The hyperparameters' typical preference vectors.
    Global,
}

impl EstimateLevel {
    pub const ALL: &'static [EstimateLevel] = &[Self::Precinct, Self::District, Self::Global];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Precinct => "precinct",
            Self::District => "district",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for EstimateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for posterior summaries.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    /// Credible interval mass. Default: 0.95.
    pub credible_level: Option<f64>,
    /// Reported estimate. Default: district.
    pub level: Option<EstimateLevel>,
}

impl SummaryConfig {
    pub fn effective_credible_level(&self) -> f64 {
        self.credible_level.unwrap_or(DEFAULT_CREDIBLE_LEVEL)
    }

    pub fn effective_level(&self) -> EstimateLevel {
        self.level.unwrap_or_default()
    }
}

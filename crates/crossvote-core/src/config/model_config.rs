//! Hierarchical model configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONCENTRATION_RATE, DEFAULT_CONCENTRATION_SHAPE};

/// Prior settings for the hierarchical preference model.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Shape of the Gamma prior on each row's concentration. Default: 2.0.
    pub concentration_shape: Option<f64>,
    /// Rate of the Gamma prior on each row's concentration. Default: 0.001.
    pub concentration_rate: Option<f64>,
}

impl ModelConfig {
    pub fn effective_concentration_shape(&self) -> f64 {
        self.concentration_shape
            .unwrap_or(DEFAULT_CONCENTRATION_SHAPE)
    }

    pub fn effective_concentration_rate(&self) -> f64 {
        self.concentration_rate.unwrap_or(DEFAULT_CONCENTRATION_RATE)
    }
}

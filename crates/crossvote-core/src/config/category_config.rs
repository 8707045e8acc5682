//! Category label configuration.

use serde::{Deserialize, Serialize};

use crate::errors::InputError;
use crate::types::CategorySet;

/// Ordered row and column labels. Empty means "not configured"; the
/// pipeline then falls back to positional labels.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CategoryConfig {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
}

impl CategoryConfig {
    /// Row labels as a validated set, if configured.
    pub fn row_set(&self) -> Result<Option<CategorySet>, InputError> {
        labels_to_set(&self.rows)
    }

    /// Column labels as a validated set, if configured.
    pub fn column_set(&self) -> Result<Option<CategorySet>, InputError> {
        labels_to_set(&self.columns)
    }
}

fn labels_to_set(labels: &[String]) -> Result<Option<CategorySet>, InputError> {
    if labels.is_empty() {
        return Ok(None);
    }
    CategorySet::new(labels.iter().cloned()).map(Some)
}

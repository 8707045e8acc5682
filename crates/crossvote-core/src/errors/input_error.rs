//! Input validation errors, raised before any sampling starts.

use super::error_code::{self, CrossvoteErrorCode};

/// Errors in the precinct data handed to the engine.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error(
        "No precincts left after join and filtering \
         (row source: {row_source}, column source: {column_source}, \
         joined: {joined}, excluded: {excluded})"
    )]
    EmptyDataset {
        row_source: usize,
        column_source: usize,
        joined: usize,
        excluded: usize,
    },

    #[error("Degenerate {side} shares in precinct {precinct}: {message}")]
    DegenerateInput {
        precinct: String,
        side: &'static str,
        message: String,
    },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid category labels: {message}")]
    InvalidCategories { message: String },
}

impl CrossvoteErrorCode for InputError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyDataset { .. } => error_code::EMPTY_DATASET,
            Self::DegenerateInput { .. } => error_code::DEGENERATE_INPUT,
            Self::DimensionMismatch { .. } => error_code::DIMENSION_MISMATCH,
            Self::InvalidCategories { .. } => error_code::INVALID_CATEGORIES,
        }
    }
}

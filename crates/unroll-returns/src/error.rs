//! Error types for return conversion.

use crate::matrix::ReturnMatrix;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Result type for return conversion operations.
pub type Result<T> = std::result::Result<T, ReturnsError>;

/// Errors that can occur while building, converting or validating return matrices.
#[derive(Debug, Error)]
pub enum ReturnsError {
    /// The input matrix has no rows
    #[error("Empty input: the return matrix has no observations")]
    EmptyInput,

    /// Values do not match the declared dates and securities
    #[error("Shape mismatch: expected {expected:?} (dates, securities), got {actual:?}")]
    ShapeMismatch {
        /// Expected (rows, columns)
        expected: (usize, usize),
        /// Actual (rows, columns)
        actual: (usize, usize),
    },

    /// A date appears more than once in the index
    #[error("Duplicate date in index: {0}")]
    DuplicateDate(NaiveDate),

    /// A security identifier appears more than once
    #[error("Duplicate security: {0}")]
    DuplicateSecurity(String),

    /// A long-format frame has two observations for the same cell
    #[error("Duplicate observation for {security} on {date}")]
    DuplicateObservation {
        /// Security identifier
        security: String,
        /// Observation date
        date: NaiveDate,
    },

    /// Two matrices that must share columns do not
    #[error("Security mismatch: expected {expected:?}, got {actual:?}")]
    SecurityMismatch {
        /// Securities of the reference matrix
        expected: Vec<String>,
        /// Securities of the offending matrix
        actual: Vec<String>,
    },

    /// Tolerance parameter is negative or not finite
    #[error("Invalid tolerance: {0} (must be finite and non-negative)")]
    InvalidTolerance(f64),

    /// A required column is absent from a frame
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A frame cell could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reconstructed month-end returns disagree with the original data
    #[error("{0}")]
    ValidationMismatch(Box<ValidationFailure>),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

/// A single (security, month end) cell where the round trip failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationMismatchCell {
    /// Security identifier
    pub security: String,
    /// Business month-end date of the compared bucket
    pub month_end: NaiveDate,
    /// `exp(sum of daily log returns) - 1`, missing treated as zero
    pub reconstructed: f64,
    /// Last MTD observation of the month, missing treated as zero
    pub original: f64,
}

/// Diagnostic context for a failed round-trip check.
///
/// Both month-end series are kept so a caller can inspect the full picture,
/// not only the offending cells.
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    /// Month-end cumulative returns rebuilt from the daily log returns
    pub reconstructed: ReturnMatrix,
    /// Month-end cumulative returns taken from the original MTD data
    pub original: ReturnMatrix,
    /// Every cell outside tolerance, in month then security order
    pub mismatches: Vec<ValidationMismatchCell>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Validation mismatch: {} month-end cell(s) differ after round trip",
            self.mismatches.len()
        )?;
        if let Some(first) = self.mismatches.first() {
            write!(
                f,
                " (first: {} at {}: reconstructed {:.8}, original {:.8})",
                first.security, first.month_end, first.reconstructed, first.original
            )?;
        }
        Ok(())
    }
}

impl From<ValidationFailure> for ReturnsError {
    fn from(failure: ValidationFailure) -> Self {
        Self::ValidationMismatch(Box::new(failure))
    }
}

//! Errors of the end-to-end pipeline.

use thiserror::Error;
use unroll_data::DataError;
use unroll_returns::ReturnsError;

/// Result type for the end-to-end pipeline.
pub type Result<T> = std::result::Result<T, UnrollError>;

/// Failure while fetching or converting MTD returns.
#[derive(Debug, Error)]
pub enum UnrollError {
    /// The data source failed.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Conversion or validation failed.
    #[error(transparent)]
    Returns(#[from] ReturnsError),

    /// A fetch request named no securities.
    #[error("no securities requested")]
    NoSecurities,
}

//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Yahoo Finance API error
    #[error("Yahoo Finance API error: {0}")]
    YahooApi(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Missing data
    #[error("Missing data for {symbol}: {reason}")]
    MissingData {
        /// Symbol that was queried
        symbol: String,
        /// Reason for missing data
        reason: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Time conversion error
    #[error("Time conversion error: {0}")]
    TimeConversion(String),

    /// Invalid symbol
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<yahoo_finance_api::YahooError> for DataError {
    fn from(err: yahoo_finance_api::YahooError) -> Self {
        Self::YahooApi(err.to_string())
    }
}

//! Export of daily log-return matrices.
//!
//! The matrix is flattened to one record per `(date, security)` cell, dates
//! ascending and securities in matrix column order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use unroll_returns::ReturnMatrix;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized output was not valid UTF-8.
    #[error("Invalid UTF-8 in output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "prettyjson" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One cell of the daily log-return matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyReturnRecord {
    /// Trading day.
    pub date: NaiveDate,

    /// Security identifier.
    pub security: String,

    /// Daily log return, `None` when undefined.
    pub log_return: Option<f64>,
}

/// Long-form view of a daily log-return matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct DailyReturnExport {
    /// Records, dates ascending.
    pub records: Vec<DailyReturnRecord>,
}

impl DailyReturnExport {
    /// Flatten a matrix into records.
    pub fn from_matrix(matrix: &ReturnMatrix) -> Self {
        let matrix = matrix.sorted_by_date();

        let records = matrix
            .dates()
            .iter()
            .zip(matrix.values().rows())
            .flat_map(|(date, row)| {
                matrix
                    .securities()
                    .iter()
                    .zip(row)
                    .map(move |(security, value)| DailyReturnRecord {
                        date: *date,
                        security: security.clone(),
                        log_return: *value,
                    })
            })
            .collect();

        Self { records }
    }

    /// Number of exported cells.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there is nothing to export.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Serialize records as CSV with a header row.
pub(crate) fn records_to_csv<'a, T, I>(records: I) -> Result<String, ExportError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

impl Exporter for DailyReturnExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                if self.records.is_empty() {
                    return Ok("date,security,log_return\n".to_string());
                }
                records_to_csv(&self.records)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

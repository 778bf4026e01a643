//! Conversion run reports.

use crate::export::{ExportError, ExportFormat, Exporter, records_to_csv};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use unroll_returns::{Conversion, Tolerance};

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The builder was not given a conversion to report on.
    #[error("Report has no conversion")]
    MissingConversion,
}

/// Month-end comparison of one security.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthReconciliation {
    /// Business month end of the bucket.
    pub month_end: NaiveDate,

    /// Security identifier.
    pub security: String,

    /// Month return rebuilt from daily log returns.
    pub reconstructed: f64,

    /// Last MTD observation of the month.
    pub original: f64,

    /// Absolute difference of the two.
    pub abs_deviation: f64,
}

/// A cumulative return that had no defined log growth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UndefinedRecord {
    /// Security identifier.
    pub security: String,

    /// Observation date.
    pub date: NaiveDate,

    /// Offending cumulative MTD return.
    pub cumulative: f64,
}

/// Summary of a validated conversion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionReport {
    /// Where the MTD data came from (file path or provider).
    pub source: String,

    /// Report generation timestamp.
    pub generated_at: DateTime<Utc>,

    /// First trading day in the output.
    pub first_date: Option<NaiveDate>,

    /// Last trading day in the output.
    pub last_date: Option<NaiveDate>,

    /// Securities, in output column order.
    pub securities: Vec<String>,

    /// Number of trading days in the output.
    pub trading_days: usize,

    /// Number of month-end buckets validated.
    pub months: usize,

    /// Missing cells in the daily output.
    pub missing_cells: usize,

    /// Tolerance used by the round-trip check.
    pub tolerance: Tolerance,

    /// Largest month-end deviation observed.
    pub max_abs_deviation: f64,

    /// Cells whose cumulative return had no defined log growth.
    pub undefined_conversions: Vec<UndefinedRecord>,

    /// Per-month, per-security reconciliation rows.
    pub reconciliation: Vec<MonthReconciliation>,
}

impl ConversionReport {
    /// Summarise `conversion`, including every reconciliation row.
    pub fn from_conversion(source: impl Into<String>, conversion: &Conversion) -> Self {
        let daily = &conversion.daily;
        let validation = &conversion.validation;

        let mut reconciliation = Vec::new();
        let reconstructed = &validation.reconstructed;
        let original_rows = validation.original.date_positions();
        let original_cols = validation.original.security_positions();
        for (i, month_end) in reconstructed.dates().iter().enumerate() {
            for (j, security) in reconstructed.securities().iter().enumerate() {
                let rebuilt = reconstructed.values()[[i, j]].unwrap_or(0.0);
                let original = original_rows
                    .get(month_end)
                    .zip(original_cols.get(security.as_str()))
                    .and_then(|(&row, &col)| validation.original.values()[[row, col]])
                    .unwrap_or(0.0);
                reconciliation.push(MonthReconciliation {
                    month_end: *month_end,
                    security: security.clone(),
                    reconstructed: rebuilt,
                    original,
                    abs_deviation: (rebuilt - original).abs(),
                });
            }
        }

        let undefined_conversions = conversion
            .undefined
            .iter()
            .map(|u| UndefinedRecord {
                security: u.security.clone(),
                date: u.date,
                cumulative: u.cumulative,
            })
            .collect();

        Self {
            source: source.into(),
            generated_at: Utc::now(),
            first_date: daily.dates().iter().min().copied(),
            last_date: daily.dates().iter().max().copied(),
            securities: daily.securities().to_vec(),
            trading_days: daily.n_dates(),
            months: validation.months(),
            missing_cells: daily.count_missing(),
            tolerance: validation.tolerance,
            max_abs_deviation: validation.max_abs_deviation,
            undefined_conversions,
            reconciliation,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nConversion Report: {}\n", self.source));
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => output.push_str(&format!("Period: {first} to {last}\n")),
            _ => output.push_str("Period: (empty)\n"),
        }
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!("  Securities:               {}\n", self.securities.len()));
        output.push_str(&format!("  Trading Days:             {}\n", self.trading_days));
        output.push_str(&format!("  Months Validated:         {}\n", self.months));
        output.push_str(&format!("  Missing Cells:            {}\n", self.missing_cells));
        output.push_str(&format!(
            "  Tolerance (rel / abs):    {:e} / {:e}\n",
            self.tolerance.relative, self.tolerance.absolute
        ));
        output.push_str(&format!(
            "  Max Deviation:            {:e}\n",
            self.max_abs_deviation
        ));

        if !self.undefined_conversions.is_empty() {
            output.push_str("\nUndefined Conversions:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for u in &self.undefined_conversions {
                output.push_str(&format!(
                    "{:<20} {:>12} {:>12.4}%\n",
                    u.security,
                    u.date.to_string(),
                    u.cumulative * 100.0
                ));
            }
        }

        if !self.reconciliation.is_empty() {
            output.push_str("\nMonth-End Reconciliation:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!(
                "{:<12} {:<20} {:>14} {:>14} {:>14}\n",
                "Month End", "Security", "Rebuilt %", "Original %", "Abs Dev"
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');

            for row in &self.reconciliation {
                output.push_str(&format!(
                    "{:<12} {:<20} {:>14.6} {:>14.6} {:>14.2e}\n",
                    row.month_end.to_string(),
                    row.security,
                    row.reconstructed * 100.0,
                    row.original * 100.0,
                    row.abs_deviation
                ));
            }
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} securities x {} trading days, {} months validated (max deviation {:e})",
            self.securities.len(),
            self.trading_days,
            self.months,
            self.max_abs_deviation
        )
    }
}

impl Exporter for ConversionReport {
    /// CSV output holds the reconciliation rows only.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => records_to_csv(&self.reconciliation),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder<'a> {
    source: Option<String>,
    conversion: Option<&'a Conversion>,
    reconciliation: bool,
}

impl<'a> ReportBuilder<'a> {
    /// Create a new report builder. Reconciliation rows are included by default.
    pub fn new() -> Self {
        Self {
            reconciliation: true,
            ..Self::default()
        }
    }

    /// Set the data source label.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the conversion to report on.
    pub const fn conversion(mut self, conversion: &'a Conversion) -> Self {
        self.conversion = Some(conversion);
        self
    }

    /// Keep or drop the per-month reconciliation rows.
    pub const fn reconciliation(mut self, include: bool) -> Self {
        self.reconciliation = include;
        self
    }

    /// Build the report.
    pub fn build(self) -> Result<ConversionReport, ReportError> {
        let conversion = self.conversion.ok_or(ReportError::MissingConversion)?;
        let mut report =
            ConversionReport::from_conversion(self.source.unwrap_or_default(), conversion);
        if !self.reconciliation {
            report.reconciliation.clear();
        }
        Ok(report)
    }
}

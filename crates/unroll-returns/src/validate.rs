//! Round-trip validation of daily log returns against MTD data.
//!
//! Daily log returns are additive, so their sum over a calendar month is the
//! month's total log return and `exp(sum) - 1` must equal the last MTD
//! observation of that month. Both sides are bucketed to business month ends
//! before comparing.

use crate::calendar::MonthKey;
use crate::config::Tolerance;
use crate::convert::log_to_pct_return;
use crate::error::{Result, ReturnsError, ValidationFailure, ValidationMismatchCell};
use crate::matrix::ReturnMatrix;
use chrono::NaiveDate;
use ndarray::Array2;
use std::collections::HashSet;

/// How daily values are folded into a monthly bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregation {
    /// Sum of present values; missing when none are present
    Sum,
    /// Latest present value by date; missing when none are present
    Last,
}

/// Every month from the earliest to the latest date, gaps included.
fn month_span<'a>(dates: impl IntoIterator<Item = &'a NaiveDate>) -> Vec<MonthKey> {
    let mut first: Option<MonthKey> = None;
    let mut last: Option<MonthKey> = None;
    for date in dates {
        let key = MonthKey::from_date(*date);
        first = Some(first.map_or(key, |f| f.min(key)));
        last = Some(last.map_or(key, |l| l.max(key)));
    }
    match (first, last) {
        (Some(first), Some(last)) => first.range_inclusive(last),
        _ => Vec::new(),
    }
}

fn resample(
    matrix: &ReturnMatrix,
    months: &[MonthKey],
    aggregation: Aggregation,
) -> Result<ReturnMatrix> {
    let sorted = matrix.sorted_by_date();
    let mut buckets = Array2::from_elem((months.len(), sorted.n_securities()), None);

    for (row, date) in sorted.dates().iter().enumerate() {
        let Ok(bucket) = months.binary_search(&MonthKey::from_date(*date)) else {
            continue;
        };
        for (col, value) in sorted.values().row(row).iter().enumerate() {
            let Some(value) = *value else {
                continue;
            };
            let cell: &mut Option<f64> = &mut buckets[[bucket, col]];
            *cell = match aggregation {
                Aggregation::Sum => Some(cell.unwrap_or(0.0) + value),
                Aggregation::Last => Some(value),
            };
        }
    }

    ReturnMatrix::new(
        months.iter().map(MonthKey::business_month_end).collect(),
        sorted.securities().to_vec(),
        buckets,
    )
}

/// Sum each calendar month per security, indexed by business month end.
///
/// Every month between the first and last date appears, including months
/// with no rows. A cell is missing when the month has no present value.
pub fn resample_month_end_sum(matrix: &ReturnMatrix) -> Result<ReturnMatrix> {
    resample(matrix, &month_span(matrix.dates()), Aggregation::Sum)
}

/// Last present observation of each calendar month per security, indexed by
/// business month end.
pub fn resample_month_end_last(matrix: &ReturnMatrix) -> Result<ReturnMatrix> {
    resample(matrix, &month_span(matrix.dates()), Aggregation::Last)
}

/// Outcome of a successful round-trip check.
#[derive(Debug, Clone)]
pub struct ValidationSummary {
    /// Month-end cumulative returns rebuilt from daily log returns
    pub reconstructed: ReturnMatrix,
    /// Month-end cumulative returns from the original MTD data
    pub original: ReturnMatrix,
    /// Largest absolute difference over all compared cells
    pub max_abs_deviation: f64,
    /// Tolerance the comparison used
    pub tolerance: Tolerance,
}

impl ValidationSummary {
    /// Number of month-end buckets compared.
    pub fn months(&self) -> usize {
        self.reconstructed.n_dates()
    }

    /// Number of securities compared.
    pub fn securities(&self) -> usize {
        self.reconstructed.n_securities()
    }
}

fn check_same_securities(daily: &ReturnMatrix, original: &ReturnMatrix) -> Result<()> {
    let daily_set: HashSet<&str> = daily.securities().iter().map(String::as_str).collect();
    let original_set: HashSet<&str> = original.securities().iter().map(String::as_str).collect();
    if daily_set != original_set {
        return Err(ReturnsError::SecurityMismatch {
            expected: original.securities().to_vec(),
            actual: daily.securities().to_vec(),
        });
    }
    Ok(())
}

fn log_head(label: &str, matrix: &ReturnMatrix) {
    const HEAD: usize = 5;
    for (i, date) in matrix.dates().iter().take(HEAD).enumerate() {
        let row: Vec<String> = matrix
            .values()
            .row(i)
            .iter()
            .map(|v| v.map_or_else(|| "NaN".to_string(), |x| format!("{:.6}", x * 100.0)))
            .collect();
        tracing::debug!(target: "unroll::validate", "{label} {date}: [{}]", row.join(", "));
    }
}

/// Check that `daily` log returns re-aggregate to the month-end values of the
/// `original` MTD matrix.
///
/// 1. Sum daily log returns per calendar month and map back with `exp(x) - 1`.
/// 2. Take the last MTD observation of each month from `original`.
/// 3. Treat missing results of either side as zero.
/// 4. Compare element-wise within `tolerance`.
///
/// Any cell outside tolerance fails the whole check with
/// [`ReturnsError::ValidationMismatch`], carrying both month-end series.
pub fn validate_round_trip(
    daily: &ReturnMatrix,
    original: &ReturnMatrix,
    tolerance: &Tolerance,
) -> Result<ValidationSummary> {
    tolerance.check()?;
    if daily.is_empty() || original.is_empty() {
        return Err(ReturnsError::EmptyInput);
    }
    check_same_securities(daily, original)?;

    let months = month_span(daily.dates().iter().chain(original.dates()));
    let reconstructed = resample(daily, &months, Aggregation::Sum)?
        .map_values(|sum| Some(log_to_pct_return(sum)));
    let original_me = resample(original, &months, Aggregation::Last)?;

    log_head("reconstructed month-end (%)", &reconstructed);
    log_head("original month-end (%)", &original_me);

    let original_cols = original_me.security_positions();
    let columns: Vec<(usize, &String, usize)> = reconstructed
        .securities()
        .iter()
        .enumerate()
        .filter_map(|(j, security)| {
            original_cols
                .get(security.as_str())
                .map(|&orig_col| (j, security, orig_col))
        })
        .collect();

    let mut mismatches = Vec::new();
    let mut max_abs_deviation = 0.0_f64;

    for (i, month_end) in reconstructed.dates().iter().enumerate() {
        for &(j, security, orig_col) in &columns {
            let rebuilt = reconstructed.values()[[i, j]].unwrap_or(0.0);
            let expected = original_me.values()[[i, orig_col]].unwrap_or(0.0);

            max_abs_deviation = max_abs_deviation.max((rebuilt - expected).abs());
            if !tolerance.is_close(rebuilt, expected) {
                mismatches.push(ValidationMismatchCell {
                    security: security.clone(),
                    month_end: *month_end,
                    reconstructed: rebuilt,
                    original: expected,
                });
            }
        }
    }

    if !mismatches.is_empty() {
        tracing::debug!(
            target: "unroll::validate",
            mismatches = mismatches.len(),
            max_abs_deviation,
            "round-trip validation failed"
        );
        return Err(ValidationFailure {
            reconstructed,
            original: original_me,
            mismatches,
        }
        .into());
    }

    Ok(ValidationSummary {
        reconstructed,
        original: original_me,
        max_abs_deviation,
        tolerance: *tolerance,
    })
}

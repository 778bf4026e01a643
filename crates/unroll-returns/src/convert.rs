//! MTD cumulative to daily log return conversion.
//!
//! Within a month, the log of the cumulative growth factor `1 + r_t` is the
//! sum of the daily log returns up to `t`. Differencing consecutive log growth
//! factors therefore yields the daily log return:
//!
//! `d_t = ln(1 + r_t) - ln(1 + r_{t-1})`
//!
//! The first trading day of a month has no predecessor in the same series,
//! but there the cumulative return is the day's return, so
//! `d_0 = ln(1 + r_0)`.

use crate::calendar::MonthKey;
use crate::matrix::ReturnMatrix;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Zip};

/// Natural log of a growth factor, undefined unless strictly positive.
pub fn log_growth(growth: f64) -> Option<f64> {
    (growth > 0.0 && growth.is_finite()).then(|| growth.ln())
}

/// Convert a percentage (decimal) return to a log return: `ln(1 + r)`.
pub fn pct_to_log_return(pct: f64) -> Option<f64> {
    log_growth(1.0 + pct)
}

/// Convert a log return back to a percentage (decimal) return: `exp(x) - 1`.
pub fn log_to_pct_return(log_return: f64) -> f64 {
    log_return.exp_m1()
}

/// Growth factors `1 + r` for every present cell.
pub fn growth_factors(cumulative: &Array2<Option<f64>>) -> Array2<Option<f64>> {
    cumulative.mapv(|r| r.map(|r| 1.0 + r))
}

/// Row-wise log differences of growth factors.
///
/// Row 0 is always missing. A cell is missing when either growth factor is
/// missing or non-positive.
pub fn log_differences(growth: &Array2<Option<f64>>) -> Array2<Option<f64>> {
    let logs = growth.mapv(|g| g.and_then(log_growth));
    let mut out = Array2::from_elem(logs.dim(), None);

    for i in 1..logs.nrows() {
        Zip::from(out.row_mut(i))
            .and(logs.row(i))
            .and(logs.row(i - 1))
            .for_each(|cell, &current, &previous| {
                *cell = current.zip(previous).map(|(c, p)| c - p);
            });
    }

    out
}

/// Direct `ln(1 + r)` for the first row, per security.
pub fn first_day_log_returns(cumulative: &Array2<Option<f64>>) -> Array1<Option<f64>> {
    if cumulative.nrows() == 0 {
        return Array1::from_elem(cumulative.ncols(), None);
    }
    cumulative
        .row(0)
        .mapv(|r| r.and_then(pct_to_log_return))
}

/// Overwrite row 0 of `daily` with every defined entry of `first`.
///
/// Undefined override entries leave the provisional cell as it is; nothing is
/// filled or interpolated.
fn overlay_first_row(daily: &mut Array2<Option<f64>>, first: &Array1<Option<f64>>) {
    if daily.nrows() == 0 {
        return;
    }
    Zip::from(daily.row_mut(0))
        .and(first)
        .for_each(|cell, &value| {
            if value.is_some() {
                *cell = value;
            }
        });
}

/// Convert one month of MTD cumulative returns into daily log returns.
///
/// `group` must hold a single calendar month with rows sorted ascending, as
/// produced by [`crate::partition_by_month`]. The output has the same dates
/// and securities. Cells whose growth factor is not strictly positive come out
/// missing; no error is raised here.
pub fn mtd_to_daily_log(group: &ReturnMatrix) -> ReturnMatrix {
    let cumulative = group.values();

    let growth = growth_factors(cumulative);
    let mut daily = log_differences(&growth);
    let first = first_day_log_returns(cumulative);
    overlay_first_row(&mut daily, &first);

    group.with_values(daily)
}

/// A cell whose daily log return is undefined because a growth factor was
/// not strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct UndefinedConversion {
    /// Security identifier
    pub security: String,
    /// Trading day
    pub date: NaiveDate,
    /// The cumulative return on that day
    pub cumulative: f64,
}

/// List present MTD cells whose daily log return is undefined.
///
/// A cell is reported when its own growth factor `1 + r_t`, or that of the
/// previous row in the same month, is not strictly positive. A missing
/// predecessor is not reported: that is missing data, not an undefined log.
/// Cells whose date or security does not appear in `daily` are skipped.
pub fn find_undefined_conversions(
    mtd: &ReturnMatrix,
    daily: &ReturnMatrix,
) -> Vec<UndefinedConversion> {
    let mtd = mtd.sorted_by_date();
    let daily_rows = daily.date_positions();
    let daily_cols = daily.security_positions();
    let columns: Vec<(usize, &String)> = mtd
        .securities()
        .iter()
        .enumerate()
        .filter(|(_, security)| daily_cols.contains_key(security.as_str()))
        .collect();

    let values = mtd.values();
    let mut undefined = Vec::new();

    for (i, date) in mtd.dates().iter().enumerate() {
        if !daily_rows.contains_key(date) {
            continue;
        }
        let has_predecessor =
            i > 0 && MonthKey::from_date(mtd.dates()[i - 1]) == MonthKey::from_date(*date);

        for &(j, security) in &columns {
            let Some(cumulative) = values[[i, j]] else {
                continue;
            };
            let own_undefined = pct_to_log_return(cumulative).is_none();
            let previous_undefined = has_predecessor
                && values[[i - 1, j]].is_some_and(|prev| pct_to_log_return(prev).is_none());

            if own_undefined || previous_undefined {
                undefined.push(UndefinedConversion {
                    security: security.clone(),
                    date: *date,
                    cumulative,
                });
            }
        }
    }

    undefined
}

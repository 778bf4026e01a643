//! The MTD return source abstraction and long-frame helpers shared by all sources.

use crate::error::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use std::future::Future;

/// Column holding the security identifier.
pub const SECURITY_COL: &str = "security";
/// Column holding the observation date.
pub const DATE_COL: &str = "date";
/// Column holding the cumulative month-to-date return.
pub const MTD_RETURN_COL: &str = "mtd_return";

/// A provider of cumulative month-to-date returns.
///
/// Implementations return a long-format frame with one row per
/// `(security, date)` observation and the columns [`SECURITY_COL`],
/// [`DATE_COL`] (polars `Date`) and [`MTD_RETURN_COL`] (`Float64`, nullable).
/// Values are in percentage units: `1.5` means a 1.5% MTD return.
pub trait MtdReturnSource {
    /// Fetch MTD returns for `securities` observed on or after `start`.
    fn fetch_mtd_percent(
        &self,
        securities: &[String],
        start: NaiveDate,
    ) -> impl Future<Output = Result<DataFrame>> + Send;
}

/// Build a long MTD frame from parallel column vectors.
pub fn mtd_frame(
    securities: Vec<String>,
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
) -> Result<DataFrame> {
    let dates: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

    let df = DataFrame::new(vec![
        Series::new(SECURITY_COL.into(), securities).into(),
        Series::new(DATE_COL.into(), dates).into(),
        Series::new(MTD_RETURN_COL.into(), values).into(),
    ])?;

    let df = df
        .lazy()
        .with_column(col(DATE_COL).cast(DataType::Date))
        .collect()?;

    Ok(df)
}

/// An MTD frame with the expected schema and no rows.
pub fn empty_mtd_frame() -> Result<DataFrame> {
    mtd_frame(Vec::new(), Vec::new(), Vec::new())
}

//! Unit handling for MTD return frames.
//!
//! Providers quote MTD returns in percent. The conversion core works with
//! decimal fractions, so frames are rescaled exactly once at the boundary.

use crate::error::Result;
use crate::source::MTD_RETURN_COL;
use polars::prelude::*;

/// Divisor taking percentage units to decimal fractions.
pub const PERCENT_SCALE: f64 = 100.0;

/// Rescale the [`MTD_RETURN_COL`] column from percent to decimal.
///
/// Nulls stay null and every other column is passed through untouched.
pub fn percent_to_decimal(df: DataFrame) -> Result<DataFrame> {
    let df = df
        .lazy()
        .with_column(
            (col(MTD_RETURN_COL).cast(DataType::Float64) / lit(PERCENT_SCALE)).alias(MTD_RETURN_COL),
        )
        .collect()?;

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mtd_frame;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    #[test]
    fn test_percent_to_decimal() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let df = mtd_frame(vec!["A".to_string(); 3], vec![d1, d2, d3], vec![Some(1.5), None, Some(-2.0)])
            .unwrap();

        let scaled = percent_to_decimal(df).unwrap();
        let values = scaled.column(MTD_RETURN_COL).unwrap().f64().unwrap();

        assert_relative_eq!(values.get(0).unwrap(), 0.015);
        assert!(values.get(1).is_none());
        assert_relative_eq!(values.get(2).unwrap(), -0.02);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let df = DataFrame::new(vec![Series::new("other".into(), vec![1.0]).into()]).unwrap();
        assert!(percent_to_decimal(df).is_err());
    }
}

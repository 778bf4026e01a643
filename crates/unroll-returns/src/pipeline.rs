//! End-to-end conversion: partition, convert, concatenate, validate.

use crate::config::ConversionConfig;
use crate::convert::{UndefinedConversion, find_undefined_conversions, mtd_to_daily_log};
use crate::error::{Result, ReturnsError};
use crate::matrix::ReturnMatrix;
use crate::partition::{MonthGroup, partition_by_month};
use crate::validate::{ValidationSummary, validate_round_trip};
use rayon::prelude::*;

/// A validated conversion together with its diagnostics.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Daily log returns, dates ascending
    pub daily: ReturnMatrix,
    /// Round-trip check results
    pub validation: ValidationSummary,
    /// Cells whose MTD value was present but whose log return is undefined
    pub undefined: Vec<UndefinedConversion>,
}

fn convert_groups(groups: &[MonthGroup], parallel: bool) -> Vec<ReturnMatrix> {
    if parallel {
        // Indexed collect keeps the chronological group order
        groups
            .par_iter()
            .map(|g| mtd_to_daily_log(&g.matrix))
            .collect()
    } else {
        groups.iter().map(|g| mtd_to_daily_log(&g.matrix)).collect()
    }
}

/// Convert an MTD cumulative matrix (decimal units) into validated daily log
/// returns, keeping the diagnostics.
///
/// Fails with [`ReturnsError::EmptyInput`] for a matrix without rows and with
/// [`ReturnsError::ValidationMismatch`] when the round trip does not hold.
pub fn convert_and_validate(mtd: &ReturnMatrix, config: &ConversionConfig) -> Result<Conversion> {
    config.tolerance.check()?;
    if mtd.is_empty() {
        return Err(ReturnsError::EmptyInput);
    }

    let groups = partition_by_month(mtd);
    tracing::debug!(
        rows = mtd.n_dates(),
        securities = mtd.n_securities(),
        months = groups.len(),
        parallel = config.parallel,
        "partitioned MTD returns"
    );

    let parts = convert_groups(&groups, config.parallel);
    let daily = ReturnMatrix::vstack(&parts)?;

    let undefined = find_undefined_conversions(mtd, &daily);
    for cell in &undefined {
        tracing::warn!(
            security = %cell.security,
            date = %cell.date,
            cumulative = cell.cumulative,
            "undefined log return: growth factor is not positive"
        );
    }

    let validation = validate_round_trip(&daily, mtd, &config.tolerance)?;
    tracing::info!(
        months = validation.months(),
        securities = validation.securities(),
        max_abs_deviation = validation.max_abs_deviation,
        "round-trip validation passed"
    );

    Ok(Conversion {
        daily,
        validation,
        undefined,
    })
}

/// Convert an MTD cumulative matrix (decimal units) into validated daily log
/// returns.
///
/// The output covers the same dates as the input, in ascending order, and the
/// same securities. See [`convert_and_validate`] for failure conditions.
pub fn daily_log_returns(mtd: &ReturnMatrix, config: &ConversionConfig) -> Result<ReturnMatrix> {
    convert_and_validate(mtd, config).map(|conversion| conversion.daily)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn two_months() -> ReturnMatrix {
        ReturnMatrix::from_rows(
            vec!["SPX".to_string(), "AGG".to_string()],
            vec![
                (date(2024, 2, 1), vec![Some(0.004), Some(-0.001)]),
                (date(2024, 1, 30), vec![Some(0.012), Some(0.002)]),
                (date(2024, 1, 31), vec![Some(0.010), Some(0.003)]),
                (date(2024, 2, 2), vec![Some(0.011), Some(-0.002)]),
                (date(2024, 1, 29), vec![Some(0.005), Some(0.001)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty = ReturnMatrix::empty(vec!["SPX".to_string()]);
        assert!(matches!(
            daily_log_returns(&empty, &ConversionConfig::default()),
            Err(ReturnsError::EmptyInput)
        ));
    }

    #[test]
    fn test_output_index_sorted_and_complete() {
        let mtd = two_months();
        let daily = daily_log_returns(&mtd, &ConversionConfig::default()).unwrap();

        let mut expected = mtd.dates().to_vec();
        expected.sort();
        assert_eq!(daily.dates(), expected.as_slice());
        assert_eq!(daily.securities(), mtd.securities());
    }

    #[test]
    fn test_first_day_of_each_month_is_direct() {
        let daily = daily_log_returns(&two_months(), &ConversionConfig::default()).unwrap();

        assert_eq!(
            daily.get(date(2024, 1, 29), "SPX"),
            Some((1.0 + 0.005_f64).ln())
        );
        assert_eq!(
            daily.get(date(2024, 2, 1), "AGG"),
            Some((1.0 - 0.001_f64).ln())
        );
        assert_abs_diff_eq!(
            daily.get(date(2024, 2, 2), "SPX").unwrap(),
            1.011_f64.ln() - 1.004_f64.ln(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mtd = two_months();
        let sequential = daily_log_returns(&mtd, &ConversionConfig::default()).unwrap();
        let parallel =
            daily_log_returns(&mtd, &ConversionConfig::default().with_parallel(true)).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_undefined_conversion_fails_validation() {
        let mtd = ReturnMatrix::from_rows(
            vec!["X".to_string()],
            vec![
                (date(2024, 1, 2), vec![Some(0.01)]),
                (date(2024, 1, 3), vec![Some(-1.5)]),
            ],
        )
        .unwrap();

        let err = convert_and_validate(&mtd, &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, ReturnsError::ValidationMismatch(_)));
    }

    #[test]
    fn test_conversion_keeps_input_untouched() {
        let mtd = two_months();
        let before = mtd.clone();
        let conversion = convert_and_validate(&mtd, &ConversionConfig::default()).unwrap();
        assert_eq!(mtd, before);
        assert!(conversion.undefined.is_empty());
        assert_eq!(conversion.validation.months(), 2);
    }
}

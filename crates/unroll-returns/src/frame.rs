//! Conversion between [`ReturnMatrix`] and long-format polars frames.
//!
//! A long frame has one row per (security, date) observation with columns
//! `security`, `date` and a value column whose name is chosen by the caller.

use crate::error::{Result, ReturnsError};
use crate::matrix::ReturnMatrix;
use chrono::NaiveDate;
use ndarray::Array2;
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Column holding security identifiers.
pub const SECURITY_COL: &str = "security";

/// Column holding observation dates.
pub const DATE_COL: &str = "date";

/// Column holding daily log returns in exported frames.
pub const LOG_RETURN_COL: &str = "log_return";

const DATE_FORMAT: &str = "%Y-%m-%d";

impl ReturnMatrix {
    /// Pivot a long frame into a matrix.
    ///
    /// Securities keep their first-seen order, dates are sorted ascending.
    /// Null values become missing cells, as do (security, date) pairs absent
    /// from the frame. Two rows for the same pair are rejected.
    pub fn from_long_frame(df: &DataFrame, value_col: &str) -> Result<Self> {
        for name in [SECURITY_COL, DATE_COL, value_col] {
            if df.column(name).is_err() {
                return Err(ReturnsError::MissingColumn(name.to_string()));
            }
        }

        let securities = df.column(SECURITY_COL)?.str()?;
        let dates = df.column(DATE_COL)?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let values = df.column(value_col)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        let mut columns: Vec<String> = Vec::new();
        let mut column_index: HashMap<String, usize> = HashMap::new();
        let mut all_dates = BTreeSet::new();
        let mut observations = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            let security = securities
                .get(i)
                .ok_or_else(|| ReturnsError::Parse(format!("Missing security in row {i}")))?;
            let date = dates
                .get(i)
                .ok_or_else(|| ReturnsError::Parse(format!("Missing date in row {i}")))?;
            let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
                .map_err(|e| ReturnsError::Parse(format!("Invalid date '{date}': {e}")))?;

            let col = match column_index.get(security) {
                Some(&col) => col,
                None => {
                    columns.push(security.to_string());
                    column_index.insert(security.to_string(), columns.len() - 1);
                    columns.len() - 1
                }
            };

            all_dates.insert(date);
            observations.push((col, date, values.get(i)));
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let row_index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut grid = Array2::from_elem((dates.len(), columns.len()), None);
        let mut seen = HashSet::with_capacity(observations.len());
        for (col, date, value) in observations {
            if !seen.insert((col, date)) {
                return Err(ReturnsError::DuplicateObservation {
                    security: columns[col].clone(),
                    date,
                });
            }
            if let Some(&row) = row_index.get(&date) {
                grid[[row, col]] = value;
            }
        }

        Self::new(dates, columns, grid)
    }

    /// Melt the matrix into a long frame, one row per cell.
    ///
    /// Rows are ordered by date, then by security. Missing cells are null.
    pub fn to_long_frame(&self, value_col: &str) -> Result<DataFrame> {
        let n = self.n_dates() * self.n_securities();
        let mut securities = Vec::with_capacity(n);
        let mut dates = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);

        for (i, date) in self.dates().iter().enumerate() {
            let date = date.format(DATE_FORMAT).to_string();
            for (j, security) in self.securities().iter().enumerate() {
                securities.push(security.clone());
                dates.push(date.clone());
                values.push(self.values()[[i, j]]);
            }
        }

        let df = DataFrame::new(vec![
            Series::new(SECURITY_COL.into(), securities).into(),
            Series::new(DATE_COL.into(), dates).into(),
            Series::new(value_col.into(), values).into(),
        ])?;

        let df = df
            .lazy()
            .with_column(col(DATE_COL).cast(DataType::Date))
            .collect()?;

        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn long_frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new(SECURITY_COL.into(), vec!["SPX", "AGG", "SPX"]).into(),
            Series::new(
                DATE_COL.into(),
                vec!["2024-01-03", "2024-01-02", "2024-01-02"],
            )
            .into(),
            Series::new("mtd_return".into(), vec![Some(0.02), None, Some(0.01)]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_long_frame() {
        let m = ReturnMatrix::from_long_frame(&long_frame(), "mtd_return").unwrap();

        assert_eq!(m.securities(), &["SPX".to_string(), "AGG".to_string()]);
        assert_eq!(m.dates(), &[date(2024, 1, 2), date(2024, 1, 3)]);
        assert_eq!(m.get(date(2024, 1, 2), "SPX"), Some(0.01));
        assert_eq!(m.get(date(2024, 1, 3), "SPX"), Some(0.02));
        // Null value and absent pair are both missing
        assert_eq!(m.get(date(2024, 1, 2), "AGG"), None);
        assert_eq!(m.get(date(2024, 1, 3), "AGG"), None);
    }

    #[test]
    fn test_from_long_frame_missing_column() {
        let result = ReturnMatrix::from_long_frame(&long_frame(), "daily");
        assert!(matches!(result, Err(ReturnsError::MissingColumn(c)) if c == "daily"));
    }

    #[test]
    fn test_from_long_frame_duplicate_observation() {
        let df = DataFrame::new(vec![
            Series::new(SECURITY_COL.into(), vec!["SPX", "SPX"]).into(),
            Series::new(DATE_COL.into(), vec!["2024-01-02", "2024-01-02"]).into(),
            Series::new("v".into(), vec![0.01, 0.02]).into(),
        ])
        .unwrap();
        assert!(matches!(
            ReturnMatrix::from_long_frame(&df, "v"),
            Err(ReturnsError::DuplicateObservation { .. })
        ));
    }

    #[test]
    fn test_to_long_frame_shape_and_types() {
        let m = ReturnMatrix::from_long_frame(&long_frame(), "mtd_return").unwrap();
        let df = m.to_long_frame(LOG_RETURN_COL).unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(
            df.get_column_names(),
            vec![SECURITY_COL, DATE_COL, LOG_RETURN_COL]
        );
        assert_eq!(df.column(DATE_COL).unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column(LOG_RETURN_COL).unwrap().null_count(), 2);

        // Date-typed column reads back through the string cast
        let back = ReturnMatrix::from_long_frame(&df, LOG_RETURN_COL).unwrap();
        assert_eq!(back, m);
    }
}

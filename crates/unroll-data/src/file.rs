//! Wide CSV files of MTD returns.
//!
//! The expected layout is one row per date and one column per security:
//!
//! ```text
//! date,AAPL,MSFT
//! 2024-01-02,0.50,-0.20
//! 2024-01-03,1.10,
//! ```
//!
//! The first column holds ISO dates whatever its header is called. Empty
//! cells and the usual NaN spellings are read as missing observations.

use crate::error::{DataError, Result};
use crate::source::{MtdReturnSource, mtd_frame};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const MISSING_MARKERS: [&str; 6] = ["", "nan", "NaN", "NA", "N/A", "#N/A"];

/// MTD returns stored in a wide CSV file, in percentage units.
#[derive(Debug, Clone)]
pub struct CsvMtdSource {
    path: PathBuf,
}

impl CsvMtdSource {
    /// Create a source reading from `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every security and every date in the file.
    pub fn read_all(&self) -> Result<DataFrame> {
        let file = File::open(&self.path)?;
        read_wide_csv(file, None, None)
    }
}

impl MtdReturnSource for CsvMtdSource {
    /// Read the requested securities; an empty list selects all of them.
    ///
    /// The file is parsed on tokio's blocking pool.
    async fn fetch_mtd_percent(&self, securities: &[String], start: NaiveDate) -> Result<DataFrame> {
        let path = self.path.clone();
        let wanted = (!securities.is_empty()).then(|| securities.to_vec());

        tokio::task::spawn_blocking(move || {
            let file = File::open(&path)?;
            read_wide_csv(file, wanted.as_deref(), Some(start))
        })
        .await
        .map_err(|e| DataError::Io(std::io::Error::other(e)))?
    }
}

/// Parse a wide MTD CSV into a long frame.
///
/// `securities` restricts the columns read and fails with
/// [`DataError::MissingData`] when one of them is absent. `start` drops rows
/// dated before it.
pub fn read_wide_csv<R: Read>(
    reader: R,
    securities: Option<&[String]>,
    start: Option<NaiveDate>,
) -> Result<DataFrame> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(DataError::Parse(
            "expected a date column followed by at least one security column".to_string(),
        ));
    }

    let columns: Vec<(usize, String)> = match securities {
        None => headers
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| (i, name.to_string()))
            .collect(),
        Some(wanted) => wanted
            .iter()
            .map(|security| {
                headers
                    .iter()
                    .skip(1)
                    .position(|h| h == security)
                    .map(|pos| (pos + 1, security.clone()))
                    .ok_or_else(|| DataError::MissingData {
                        symbol: security.clone(),
                        reason: "no such column in CSV".to_string(),
                    })
            })
            .collect::<Result<_>>()?,
    };

    let mut out_securities = Vec::new();
    let mut out_dates = Vec::new();
    let mut out_values = Vec::new();

    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
            DataError::Parse(format!("row {}: invalid date '{raw_date}': {e}", line + 2))
        })?;

        if start.is_some_and(|s| date < s) {
            continue;
        }

        for (idx, security) in &columns {
            let cell = record.get(*idx).unwrap_or_default();
            out_securities.push(security.clone());
            out_dates.push(date);
            out_values.push(parse_cell(cell, line + 2, security)?);
        }
    }

    mtd_frame(out_securities, out_dates, out_values)
}

fn parse_cell(cell: &str, line: usize, security: &str) -> Result<Option<f64>> {
    if MISSING_MARKERS.contains(&cell) {
        return Ok(None);
    }

    let value: f64 = cell.parse().map_err(|e| {
        DataError::Parse(format!("row {line}: invalid value '{cell}' for {security}: {e}"))
    })?;

    Ok(value.is_finite().then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DATE_COL, MTD_RETURN_COL, SECURITY_COL};
    use rstest::rstest;

    const SAMPLE: &str = "\
date,AAA,BBB
2024-01-30,1.0,2.0
2024-01-31,1.5,
2024-02-01,0.2,NaN
";

    #[test]
    fn test_read_all_columns() {
        let df = read_wide_csv(SAMPLE.as_bytes(), None, None).unwrap();
        assert_eq!(df.height(), 6);
        assert_eq!(df.column(MTD_RETURN_COL).unwrap().null_count(), 2);
        assert_eq!(df.column(DATE_COL).unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn test_select_securities_and_start() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let df = read_wide_csv(SAMPLE.as_bytes(), Some(&["BBB".to_string()]), Some(start)).unwrap();

        assert_eq!(df.height(), 2);
        let securities = df.column(SECURITY_COL).unwrap().str().unwrap();
        assert!(securities.into_iter().all(|s| s == Some("BBB")));
    }

    #[test]
    fn test_unknown_security() {
        let err = read_wide_csv(SAMPLE.as_bytes(), Some(&["ZZZ".to_string()]), None).unwrap_err();
        assert!(matches!(err, DataError::MissingData { symbol, .. } if symbol == "ZZZ"));
    }

    #[test]
    fn test_bad_date() {
        let csv = "date,AAA\n01/02/2024,1.0\n";
        assert!(matches!(
            read_wide_csv(csv.as_bytes(), None, None),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_no_security_columns() {
        let csv = "date\n2024-01-02\n";
        assert!(read_wide_csv(csv.as_bytes(), None, None).is_err());
    }

    #[rstest]
    #[case("", None)]
    #[case("NaN", None)]
    #[case("#N/A", None)]
    #[case("inf", None)]
    #[case("1.25", Some(1.25))]
    #[case("-0.5", Some(-0.5))]
    fn test_parse_cell(#[case] cell: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_cell(cell, 2, "AAA").unwrap(), expected);
    }

    #[test]
    fn test_parse_cell_garbage() {
        assert!(parse_cell("abc", 2, "AAA").is_err());
    }
}

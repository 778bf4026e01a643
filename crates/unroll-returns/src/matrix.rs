//! Date-indexed, multi-security return matrix.
//!
//! A [`ReturnMatrix`] holds one row per trading day and one column per
//! security. Cells are decimal returns (0.05 for 5%) or `None` for missing
//! data. The same type carries both MTD cumulative returns and daily log
//! returns; which one it holds is a property of the pipeline stage.

use crate::error::{Result, ReturnsError};
use chrono::NaiveDate;
use ndarray::{Array2, Axis, Slice};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// Time-indexed table of returns, rows are dates and columns are securities.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    dates: Vec<NaiveDate>,
    securities: Vec<String>,
    values: Array2<Option<f64>>,
}

impl ReturnMatrix {
    /// Create a matrix from its index, columns and values.
    ///
    /// Dates and securities must be unique and `values` must have shape
    /// `(dates.len(), securities.len())`. Dates need not be sorted.
    /// Non-finite values are stored as missing.
    pub fn new(
        dates: Vec<NaiveDate>,
        securities: Vec<String>,
        values: Array2<Option<f64>>,
    ) -> Result<Self> {
        let expected = (dates.len(), securities.len());
        if values.dim() != expected {
            return Err(ReturnsError::ShapeMismatch {
                expected,
                actual: values.dim(),
            });
        }

        let mut seen_dates = HashSet::with_capacity(dates.len());
        for date in &dates {
            if !seen_dates.insert(*date) {
                return Err(ReturnsError::DuplicateDate(*date));
            }
        }

        let mut seen_securities = HashSet::with_capacity(securities.len());
        for security in &securities {
            if !seen_securities.insert(security.as_str()) {
                return Err(ReturnsError::DuplicateSecurity(security.clone()));
            }
        }

        let values = values.mapv(|v| v.filter(|x| x.is_finite()));

        Ok(Self {
            dates,
            securities,
            values,
        })
    }

    /// Create a matrix from `(date, row values)` pairs.
    pub fn from_rows(
        securities: Vec<String>,
        rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
    ) -> Result<Self> {
        let n_cols = securities.len();
        let mut values = Array2::from_elem((rows.len(), n_cols), None);
        let mut dates = Vec::with_capacity(rows.len());

        for (i, (date, row)) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(ReturnsError::ShapeMismatch {
                    expected: (1, n_cols),
                    actual: (1, row.len()),
                });
            }
            for (j, value) in row.into_iter().enumerate() {
                values[[i, j]] = value;
            }
            dates.push(date);
        }

        Self::new(dates, securities, values)
    }

    /// A matrix with the given columns and no rows.
    pub fn empty(securities: Vec<String>) -> Self {
        let n_cols = securities.len();
        Self {
            dates: Vec::new(),
            securities,
            values: Array2::from_elem((0, n_cols), None),
        }
    }

    /// Row index.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column identifiers.
    pub fn securities(&self) -> &[String] {
        &self.securities
    }

    /// Cell values, `None` where missing.
    pub const fn values(&self) -> &Array2<Option<f64>> {
        &self.values
    }

    /// Number of rows.
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Number of columns.
    pub fn n_securities(&self) -> usize {
        self.securities.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column position of `security`.
    pub fn security_index(&self, security: &str) -> Option<usize> {
        self.securities.iter().position(|s| s == security)
    }

    /// Column position of every security, for repeated lookups.
    pub fn security_positions(&self) -> HashMap<&str, usize> {
        self.securities
            .iter()
            .enumerate()
            .map(|(j, s)| (s.as_str(), j))
            .collect()
    }

    /// Row position of every date, for repeated lookups.
    pub fn date_positions(&self) -> HashMap<NaiveDate, usize> {
        self.dates.iter().enumerate().map(|(i, d)| (*d, i)).collect()
    }

    /// Row position of `date`.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.iter().position(|d| *d == date)
    }

    /// Value for `security` on `date`; `None` if absent or missing.
    pub fn get(&self, date: NaiveDate, security: &str) -> Option<f64> {
        let row = self.date_index(date)?;
        let col = self.security_index(security)?;
        self.values[[row, col]]
    }

    /// All values of one security, in row order.
    pub fn column(&self, security: &str) -> Option<Vec<Option<f64>>> {
        let col = self.security_index(security)?;
        Some(self.values.column(col).to_vec())
    }

    /// Whether dates are strictly ascending.
    pub fn is_sorted(&self) -> bool {
        self.dates.windows(2).all(|w| w[0] < w[1])
    }

    /// Copy of the matrix with rows in ascending date order.
    pub fn sorted_by_date(&self) -> Self {
        if self.is_sorted() {
            return self.clone();
        }
        let mut order: Vec<usize> = (0..self.dates.len()).collect();
        order.sort_by_key(|&i| self.dates[i]);
        self.select_rows(&order)
    }

    /// Copy of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            securities: self.securities.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }

    /// Copy of a contiguous block of rows.
    pub fn slice_rows(&self, range: Range<usize>) -> Self {
        Self {
            dates: self.dates[range.clone()].to_vec(),
            securities: self.securities.clone(),
            values: self.values.slice_axis(Axis(0), Slice::from(range)).to_owned(),
        }
    }

    /// Stack matrices with identical columns on top of each other.
    ///
    /// Row order is the order of `parts`. Dates must stay unique across parts.
    pub fn vstack(parts: &[Self]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(ReturnsError::EmptyInput);
        };

        let n_rows = parts.iter().map(Self::n_dates).sum();
        let n_cols = first.n_securities();
        let mut dates = Vec::with_capacity(n_rows);
        let mut values = Array2::from_elem((n_rows, n_cols), None);

        let mut offset = 0;
        for part in parts {
            if part.securities != first.securities {
                return Err(ReturnsError::SecurityMismatch {
                    expected: first.securities.clone(),
                    actual: part.securities.clone(),
                });
            }
            values
                .slice_axis_mut(Axis(0), Slice::from(offset..offset + part.n_dates()))
                .assign(&part.values);
            dates.extend_from_slice(&part.dates);
            offset += part.n_dates();
        }

        Self::new(dates, first.securities.clone(), values)
    }

    /// Apply `f` to every present value; missing cells stay missing.
    ///
    /// `f` may itself return `None` to mark a cell undefined.
    pub fn map_values<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> Option<f64>,
    {
        Self {
            dates: self.dates.clone(),
            securities: self.securities.clone(),
            values: self
                .values
                .mapv(|v| v.and_then(&f).filter(|x| x.is_finite())),
        }
    }

    /// Multiply every present value by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        self.map_values(|v| Some(v * factor))
    }

    /// Dense copy with missing cells replaced by `fill`.
    pub fn fill_missing(&self, fill: f64) -> Array2<f64> {
        self.values.mapv(|v| v.unwrap_or(fill))
    }

    /// Number of missing cells.
    pub fn count_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Same index and columns with new values of identical shape.
    pub(crate) fn with_values(&self, values: Array2<Option<f64>>) -> Self {
        debug_assert_eq!(values.dim(), self.values.dim());
        Self {
            dates: self.dates.clone(),
            securities: self.securities.clone(),
            values: values.mapv(|v| v.filter(|x| x.is_finite())),
        }
    }
}

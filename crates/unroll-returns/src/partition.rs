//! Monthly partitioning of a return matrix.

use crate::calendar::MonthKey;
use crate::matrix::ReturnMatrix;

/// Rows of a return matrix that fall in one calendar month, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthGroup {
    /// Calendar month shared by every row
    pub key: MonthKey,
    /// The rows themselves
    pub matrix: ReturnMatrix,
}

/// Split `matrix` into calendar-month groups.
///
/// Rows are sorted ascending first, so a single scan that starts a new group
/// whenever the (year, month) key changes yields the groups in chronological
/// order. Every row lands in exactly one group; empty input gives no groups.
pub fn partition_by_month(matrix: &ReturnMatrix) -> Vec<MonthGroup> {
    let sorted = matrix.sorted_by_date();
    let dates = sorted.dates();

    let mut groups = Vec::new();
    let mut start = 0;
    for end in 1..=dates.len() {
        let key = MonthKey::from_date(dates[start]);
        if end == dates.len() || MonthKey::from_date(dates[end]) != key {
            groups.push(MonthGroup {
                key,
                matrix: sorted.slice_rows(start..end),
            });
            start = end;
        }
    }

    groups
}

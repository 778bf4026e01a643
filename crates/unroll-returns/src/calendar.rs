//! Calendar-month keys and business month-end dates.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use std::fmt;

/// A calendar month, identified by (year, month).
///
/// Stored as the first day of the month so ordering and equality follow the
/// calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey(NaiveDate);

impl MonthKey {
    /// Month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date - Days::new(u64::from(date.day0())))
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Calendar month (1-12).
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// First calendar day of the month.
    pub const fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Last calendar day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.next().0 - Days::new(1)
    }

    /// The following month.
    pub fn next(&self) -> Self {
        Self(self.0 + Months::new(1))
    }

    /// Last weekday (Monday-Friday) of the month.
    ///
    /// Holidays are not considered; this matches a plain business-day
    /// calendar.
    pub fn business_month_end(&self) -> NaiveDate {
        let mut day = self.last_day();
        while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day = day - Days::new(1);
        }
        day
    }

    /// Every month from `self` through `last`, inclusive.
    ///
    /// Empty when `last` precedes `self`.
    pub fn range_inclusive(self, last: Self) -> Vec<Self> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

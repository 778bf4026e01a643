//! SQLite caching layer for MTD returns.

use crate::error::{DataError, Result};
use crate::source::{DATE_COL, MTD_RETURN_COL, SECURITY_COL, mtd_frame};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use polars::prelude::*;
use rusqlite::{Connection, params};
use std::path::Path;

/// Share of weekdays in a range that must be cached before the range counts
/// as covered. Exchange holidays account for the remainder.
const COVERAGE_RATIO: f64 = 0.9;

/// Weekdays allowed between the requested start and the first cached row,
/// enough to span a holiday at the start of a month.
const MAX_LEADING_GAP: usize = 3;

/// SQLite cache for MTD returns, stored in percentage units.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Create a new SQLite cache.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS mtd_returns (
                security TEXT NOT NULL,
                date TEXT NOT NULL,
                mtd_return REAL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (security, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_mtd_security_date ON mtd_returns(security, date)",
            [],
        )?;

        Ok(())
    }

    /// Check if MTD returns are cached for a security and date range.
    pub fn has_returns(&self, security: &str, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let (count, first): (i64, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MIN(date) FROM mtd_returns
             WHERE security = ?1 AND date >= ?2 AND date <= ?3",
            params![security, start.to_string(), end.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let Some(first) = first.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()) else {
            return Ok(false);
        };

        // The ratio alone accepts a range whose first days are missing.
        let leading_gap = weekdays_before(start, first);
        let expected = (weekdays_between(start, end) as f64 * COVERAGE_RATIO).floor() as i64;

        Ok(leading_gap <= MAX_LEADING_GAP && count > 0 && count >= expected)
    }

    /// Get cached MTD returns for a security and date range.
    pub fn get_returns(&self, security: &str, start: NaiveDate, end: NaiveDate) -> Result<DataFrame> {
        let mut stmt = self.conn.prepare(
            "SELECT security, date, mtd_return
             FROM mtd_returns
             WHERE security = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(params![security, start.to_string(), end.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut securities = Vec::new();
        let mut dates = Vec::new();
        let mut values = Vec::new();

        for row in rows {
            let (sec, date, value) = row?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("cached date '{date}': {e}")))?;
            securities.push(sec);
            dates.push(date);
            values.push(value);
        }

        if dates.is_empty() {
            return Err(DataError::MissingData {
                symbol: security.to_string(),
                reason: "No cached data found".to_string(),
            });
        }

        mtd_frame(securities, dates, values)
    }

    /// Store a long MTD frame in the cache, replacing existing observations.
    pub fn put_returns(&self, df: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let securities = df.column(SECURITY_COL)?.str()?;
        let dates = df.column(DATE_COL)?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let values = df.column(MTD_RETURN_COL)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        let tx = self.conn.unchecked_transaction()?;

        for i in 0..df.height() {
            let security = securities
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing security".to_string()))?;
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing date".to_string()))?;
            let value = values.get(i);

            tx.execute(
                "INSERT OR REPLACE INTO mtd_returns (security, date, mtd_return, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![security, date, value, cached_at],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Clear all cached data.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM mtd_returns", [])?;
        Ok(())
    }

    /// Clear cached data for a specific security.
    pub fn clear_security(&self, security: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM mtd_returns WHERE security = ?1", params![security])?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let (total, securities, first, last): (i64, i64, Option<String>, Option<String>) =
            self.conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT security), MIN(date), MAX(date) FROM mtd_returns",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let parse = |s: Option<String>| s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());

        Ok(CacheStats {
            total_observations: total as usize,
            unique_securities: securities as usize,
            first_date: parse(first),
            last_date: parse(last),
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cached observations
    pub total_observations: usize,
    /// Number of unique securities
    pub unique_securities: usize,
    /// Earliest cached date
    pub first_date: Option<NaiveDate>,
    /// Latest cached date
    pub last_date: Option<NaiveDate>,
}

fn weekdays_between(start: NaiveDate, end: NaiveDate) -> usize {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count()
}

/// Weekdays in `[start, first)`.
fn weekdays_before(start: NaiveDate, first: NaiveDate) -> usize {
    start
        .iter_days()
        .take_while(|d| *d < first)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> DataFrame {
        mtd_frame(
            vec!["AAA".to_string(), "AAA".to_string(), "BBB".to_string()],
            vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 2)],
            vec![Some(0.5), None, Some(-1.25)],
        )
        .unwrap()
    }

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
    }

    #[test]
    fn test_put_and_get_returns() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_returns(&sample()).unwrap();

        let df = cache.get_returns("AAA", d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column(DATE_COL).unwrap().dtype(), &DataType::Date);

        let values = df.column(MTD_RETURN_COL).unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(0.5));
        assert_eq!(values.get(1), None);
    }

    #[test]
    fn test_get_missing_security() {
        let cache = SqliteCache::in_memory().unwrap();
        let err = cache.get_returns("ZZZ", d(2024, 1, 1), d(2024, 1, 31)).unwrap_err();
        assert!(matches!(err, DataError::MissingData { .. }));
    }

    #[test]
    fn test_put_replaces_existing() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_returns(&sample()).unwrap();

        let update = mtd_frame(vec!["AAA".to_string()], vec![d(2024, 1, 2)], vec![Some(9.0)]).unwrap();
        cache.put_returns(&update).unwrap();

        let df = cache.get_returns("AAA", d(2024, 1, 2), d(2024, 1, 2)).unwrap();
        assert_eq!(df.column(MTD_RETURN_COL).unwrap().f64().unwrap().get(0), Some(9.0));
        assert_eq!(cache.get_stats().unwrap().total_observations, 3);
    }

    #[test]
    fn test_has_returns_coverage() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_returns(&sample()).unwrap();

        // Tue 2nd and Wed 3rd are both cached.
        assert!(cache.has_returns("AAA", d(2024, 1, 2), d(2024, 1, 3)).unwrap());
        // A whole month with two observations is not covered.
        assert!(!cache.has_returns("AAA", d(2024, 1, 1), d(2024, 1, 31)).unwrap());
        assert!(!cache.has_returns("ZZZ", d(2024, 1, 2), d(2024, 1, 3)).unwrap());
        assert!(cache.has_returns("AAA", d(2024, 2, 1), d(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_has_returns_requires_start_coverage() {
        let dates: Vec<NaiveDate> = d(2024, 1, 8)
            .iter_days()
            .take_while(|day| *day <= d(2024, 2, 29))
            .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
            .collect();
        let frame = mtd_frame(
            vec!["AAA".to_string(); dates.len()],
            dates.clone(),
            vec![Some(1.0); dates.len()],
        )
        .unwrap();
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_returns(&frame).unwrap();

        // 39 of 44 weekdays clears the ratio, but 2-5 January are absent.
        assert_eq!(weekdays_between(d(2024, 1, 1), d(2024, 2, 29)), 44);
        assert_eq!(dates.len(), 39);
        assert!(!cache.has_returns("AAA", d(2024, 1, 1), d(2024, 2, 29)).unwrap());

        // A short leading gap is tolerated.
        assert!(cache.has_returns("AAA", d(2024, 1, 3), d(2024, 2, 29)).unwrap());
        assert!(cache.has_returns("AAA", d(2024, 1, 8), d(2024, 2, 29)).unwrap());
        assert!(cache.has_returns("AAA", d(2024, 1, 6), d(2024, 2, 29)).unwrap());
    }

    #[test]
    fn test_cache_stats() {
        let cache = SqliteCache::in_memory().unwrap();
        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_observations, 0);
        assert_eq!(stats.first_date, None);

        cache.put_returns(&sample()).unwrap();
        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_observations, 3);
        assert_eq!(stats.unique_securities, 2);
        assert_eq!(stats.first_date, Some(d(2024, 1, 2)));
        assert_eq!(stats.last_date, Some(d(2024, 1, 3)));
    }

    #[test]
    fn test_clear_operations() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put_returns(&sample()).unwrap();

        cache.clear_security("AAA").unwrap();
        assert_eq!(cache.get_stats().unwrap().unique_securities, 1);

        cache.clear_all().unwrap();
        assert_eq!(cache.get_stats().unwrap().total_observations, 0);
    }

    #[test]
    fn test_weekdays_between() {
        // Mon 1st through Sun 7th.
        assert_eq!(weekdays_between(d(2024, 1, 1), d(2024, 1, 7)), 5);
        assert_eq!(weekdays_between(d(2024, 1, 6), d(2024, 1, 7)), 0);
    }
}

//! Month-to-date returns derived from Yahoo Finance adjusted closes.
//!
//! Yahoo does not publish MTD returns directly. For each trading day the MTD
//! return is `100 * (close / base - 1)`, where `base` is the last adjusted
//! close of the previous month. When the download window does not reach back
//! into the previous month, the first close of the current month is used as
//! base instead, so that day reads as a flat 0%.

use crate::error::{DataError, Result};
use crate::source::{MtdReturnSource, mtd_frame};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use polars::prelude::*;
use std::time::Duration;
use tokio::time::sleep;
use yahoo_finance_api as yahoo;

/// Extra calendar days fetched before the first month so the previous
/// month's last close is available as the MTD base.
const BASE_LOOKBACK_DAYS: u64 = 14;

/// Yahoo Finance MTD return source with rate limiting.
pub struct YahooMtdSource {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooMtdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooMtdSource")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooMtdSource {
    /// Create a new source with default rate limiting (1 req/sec).
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(1000))
    }

    /// Create a new source with custom rate limiting.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch adjusted closes for a single symbol, oldest first.
    ///
    /// # Arguments
    /// * `symbol` - The ticker symbol (e.g., "AAPL")
    /// * `start` - First calendar day of the window
    /// * `end` - Last calendar day of the window
    pub async fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset_datetime(start)?;
        let end_time = to_offset_datetime(end + Days::new(1))?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: "No data returned from Yahoo Finance".to_string(),
            });
        }

        let mut closes = quotes
            .iter()
            .map(|q| {
                let date = i64::try_from(q.timestamp)
                    .ok()
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.date_naive())
                    .ok_or_else(|| {
                        DataError::TimeConversion(format!("invalid quote timestamp {}", q.timestamp))
                    })?;
                Ok((date, q.adjclose))
            })
            .collect::<Result<Vec<_>>>()?;

        closes.sort_by_key(|(date, _)| *date);
        closes.dedup_by_key(|(date, _)| *date);

        sleep(self.rate_limit_delay).await;

        Ok(closes)
    }

    /// Fetch MTD returns in percent for one symbol from `start` to today.
    pub async fn fetch_symbol_mtd(&self, symbol: &str, start: NaiveDate) -> Result<DataFrame> {
        let window_start = first_of_month(start) - Days::new(BASE_LOOKBACK_DAYS);
        let end = Utc::now().date_naive();

        let closes = self.fetch_closes(symbol, window_start, end).await?;
        let mtd = mtd_percent_from_closes(&closes, start);

        if mtd.is_empty() {
            return Err(DataError::MissingData {
                symbol: symbol.to_string(),
                reason: format!("no trading days on or after {start}"),
            });
        }

        let securities = vec![symbol.to_string(); mtd.len()];
        let (dates, values): (Vec<_>, Vec<_>) = mtd.into_iter().unzip();
        mtd_frame(securities, dates, values)
    }
}

impl MtdReturnSource for YahooMtdSource {
    async fn fetch_mtd_percent(&self, securities: &[String], start: NaiveDate) -> Result<DataFrame> {
        let mut dfs = Vec::new();

        for symbol in securities {
            match self.fetch_symbol_mtd(symbol, start).await {
                Ok(df) => dfs.push(df.lazy()),
                Err(e) => {
                    tracing::warn!(%symbol, error = %e, "failed to fetch MTD returns");
                    continue;
                }
            }
        }

        if dfs.is_empty() {
            return Err(DataError::MissingData {
                symbol: "batch".to_string(),
                reason: "No data fetched for any symbol".to_string(),
            });
        }

        let combined = concat(dfs, UnionArgs::default())?.collect()?;

        Ok(combined)
    }
}

/// Derive percent MTD returns from date-sorted adjusted closes.
///
/// Only days on or after `start` are emitted. A day whose base close is not
/// strictly positive yields `None`.
pub fn mtd_percent_from_closes(
    closes: &[(NaiveDate, f64)],
    start: NaiveDate,
) -> Vec<(NaiveDate, Option<f64>)> {
    let mut out = Vec::new();
    let mut prev_month_close: Option<f64> = None;
    let mut base: Option<f64> = None;
    let mut current_month: Option<NaiveDate> = None;
    let mut last_close: Option<f64> = None;

    for &(date, close) in closes {
        let month = first_of_month(date);
        if current_month != Some(month) {
            if current_month.is_some() {
                prev_month_close = last_close;
            }
            base = prev_month_close.or(Some(close));
            current_month = Some(month);
        }
        last_close = Some(close);

        if date < start {
            continue;
        }

        let mtd = base
            .filter(|b| *b > 0.0 && b.is_finite())
            .map(|b| 100.0 * (close / b - 1.0))
            .filter(|r| r.is_finite());
        out.push((date, mtd));
    }

    out
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

fn to_offset_datetime(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

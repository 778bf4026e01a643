//! Cached, concurrent MTD fetch pipeline.
//!
//! Looks every security up in the SQLite cache first, fetches the rest from
//! Yahoo Finance with bounded concurrency and writes fresh data back to the
//! cache.

use super::cache_manager;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use polars::prelude::*;
use unroll_data::cache::SqliteCache;
use unroll_data::error::{DataError, Result};
use unroll_data::{MtdReturnSource, YahooMtdSource};

/// Configuration for data fetching.
#[derive(Debug, Clone)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub(crate) use_cache: bool,
    /// Whether to force refresh (ignore cached data).
    pub(crate) force_refresh: bool,
    /// Maximum number of requests in flight.
    pub(crate) concurrency: usize,
}

/// Default number of concurrent fetches.
pub(crate) const DEFAULT_CONCURRENCY: usize = 4;

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Yahoo Finance MTD source backed by the local cache.
pub(crate) struct CachedYahooSource {
    provider: YahooMtdSource,
    config: FetchConfig,
    progress: Option<ProgressBar>,
}

impl CachedYahooSource {
    pub(crate) const fn new(
        provider: YahooMtdSource,
        config: FetchConfig,
        progress: Option<ProgressBar>,
    ) -> Self {
        Self {
            provider,
            config,
            progress,
        }
    }
}

impl MtdReturnSource for CachedYahooSource {
    async fn fetch_mtd_percent(&self, securities: &[String], start: NaiveDate) -> Result<DataFrame> {
        let cache = if self.config.use_cache {
            match cache_manager::open_cache() {
                Ok(cache) => Some(cache),
                Err(e) => {
                    tracing::warn!(error = %e, "cache unavailable, fetching everything");
                    None
                }
            }
        } else {
            None
        };

        fetch_mtd_with_progress(
            &self.provider,
            securities,
            start,
            &self.config,
            cache,
            self.progress.as_ref(),
        )
        .await
    }
}

/// Split `securities` into frames served from the cache and securities that
/// still need fetching.
fn split_cached(
    cache: Option<&SqliteCache>,
    securities: &[String],
    start: NaiveDate,
    end: NaiveDate,
    force_refresh: bool,
) -> (Vec<DataFrame>, Vec<String>) {
    let Some(cache) = cache.filter(|_| !force_refresh) else {
        return (Vec::new(), securities.to_vec());
    };

    let mut cached = Vec::new();
    let mut to_fetch = Vec::new();
    for security in securities {
        if cache.has_returns(security, start, end).unwrap_or(false)
            && let Ok(df) = cache.get_returns(security, start, end)
        {
            tracing::debug!(%security, "served from cache");
            cached.push(df);
            continue;
        }
        to_fetch.push(security.clone());
    }

    (cached, to_fetch)
}

/// Fetch MTD returns (percent) for all securities with an optional progress bar.
pub(crate) async fn fetch_mtd_with_progress(
    provider: &YahooMtdSource,
    securities: &[String],
    start: NaiveDate,
    config: &FetchConfig,
    cache: Option<SqliteCache>,
    progress: Option<&ProgressBar>,
) -> Result<DataFrame> {
    let end = Utc::now().date_naive();
    let (cached_dfs, to_fetch) =
        split_cached(cache.as_ref(), securities, start, end, config.force_refresh);

    let concurrency = config.concurrency.max(1);
    if let Some(pb) = progress {
        pb.set_length(securities.len() as u64);
        pb.set_position(cached_dfs.len() as u64);
        if to_fetch.is_empty() {
            pb.set_message("Loading from cache...");
        } else {
            pb.set_message(format!(
                "Fetching {} securities ({} concurrent)...",
                to_fetch.len(),
                concurrency
            ));
        }
    }

    let outcomes: Vec<(String, Result<DataFrame>)> = stream::iter(to_fetch)
        .map(|security| async move {
            let result = provider.fetch_symbol_mtd(&security, start).await;
            (security, result)
        })
        .buffer_unordered(concurrency)
        .inspect(|_| {
            if let Some(pb) = progress {
                pb.inc(1);
            }
        })
        .collect()
        .await;

    let mut all_dfs: Vec<LazyFrame> = cached_dfs.into_iter().map(DataFrame::lazy).collect();
    for (security, outcome) in outcomes {
        match outcome {
            Ok(df) => {
                if let Some(cache) = &cache
                    && let Err(e) = cache.put_returns(&df)
                {
                    tracing::warn!(%security, error = %e, "failed to cache MTD returns");
                }
                all_dfs.push(df.lazy());
            }
            Err(e) => {
                let warn = || tracing::warn!(%security, error = %e, "failed to fetch MTD returns");
                match progress {
                    Some(pb) => pb.suspend(warn),
                    None => warn(),
                }
            }
        }
    }

    if all_dfs.is_empty() {
        return Err(DataError::MissingData {
            symbol: "batch".to_string(),
            reason: "No data fetched for any security".to_string(),
        });
    }

    let combined = concat(all_dfs, UnionArgs::default())?.collect()?;

    tracing::info!(
        rows = combined.height(),
        securities = securities.len(),
        "MTD fetch complete"
    );

    Ok(combined)
}

//! Location and lifecycle of the on-disk MTD cache.

use std::path::PathBuf;
use unroll_data::cache::SqliteCache;
use unroll_data::error::Result;

const CACHE_DIR_NAME: &str = "unroll";
const CACHE_FILE_NAME: &str = "unroll.db";

/// Path of the SQLite cache, under the platform cache directory.
pub(crate) fn get_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_DIR_NAME)
        .join(CACHE_FILE_NAME)
}

/// Open the cache, creating its directory and schema on first use.
pub(crate) fn open_cache() -> Result<SqliteCache> {
    let path = get_cache_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    SqliteCache::new(&path)
}

/// Print cache location and contents.
pub(crate) fn print_cache_info() {
    let path = get_cache_path();
    println!("  Cache location: {}", path.display());
    match open_cache().and_then(|cache| cache.get_stats()) {
        Ok(stats) => {
            println!(
                "  Cached data: {} observations for {} securities",
                stats.total_observations, stats.unique_securities
            );
            if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
                println!("  Date range: {first} to {last}");
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not read cache"),
    }
}

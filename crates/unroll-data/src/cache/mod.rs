//! Caching layer for MTD return data.

pub mod sqlite;

pub use sqlite::{CacheStats, SqliteCache};

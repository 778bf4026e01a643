//! Integration of the data sources, the SQLite cache and the conversion core.
//!
//! This module provides the cache location handling and the cached, concurrent
//! Yahoo Finance fetch pipeline used by the `fetch` and `cache` commands.

pub(crate) mod cache_manager;
pub(crate) mod data_pipeline;

//! Yahoo Finance data providers.

pub mod mtd;

pub use mtd::{YahooMtdSource, mtd_percent_from_closes};

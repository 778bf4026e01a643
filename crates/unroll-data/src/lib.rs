#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/unroll/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod file;
pub mod source;
pub mod units;
pub mod yahoo;

pub use error::{DataError, Result};
pub use file::CsvMtdSource;
pub use source::{DATE_COL, MTD_RETURN_COL, MtdReturnSource, SECURITY_COL};
pub use yahoo::YahooMtdSource;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

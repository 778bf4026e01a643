#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/unroll/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod excess;

// Re-export main types from sub-crates
pub use unroll_data as data;
pub use unroll_output as output;
pub use unroll_returns as returns;

pub use error::{Result, UnrollError};
pub use excess::{MtdInput, MtdRequest, excess_conversion, excess_daily, fetch_mtd_matrix};
pub use unroll_returns::{Conversion, ConversionConfig, ReturnMatrix, Tolerance};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

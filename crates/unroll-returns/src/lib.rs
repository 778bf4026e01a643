#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/unroll/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod config;
pub mod convert;
pub mod error;
pub mod frame;
pub mod matrix;
pub mod partition;
pub mod pipeline;
pub mod validate;

pub use calendar::MonthKey;
pub use config::{ConversionConfig, Tolerance};
pub use convert::{UndefinedConversion, find_undefined_conversions, mtd_to_daily_log};
pub use error::{Result, ReturnsError, ValidationFailure, ValidationMismatchCell};
pub use matrix::ReturnMatrix;
pub use partition::{MonthGroup, partition_by_month};
pub use pipeline::{Conversion, convert_and_validate, daily_log_returns};
pub use validate::{ValidationSummary, validate_round_trip};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

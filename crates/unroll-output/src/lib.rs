#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/unroll/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;

pub use export::{DailyReturnExport, DailyReturnRecord, ExportError, ExportFormat, Exporter};
pub use report::{
    ConversionReport, MonthReconciliation, ReportBuilder, ReportError, UndefinedRecord,
};

//! Payload retrieval and format parsers for the macrofeed pipeline.
//!
//! This crate handles:
//! - Raw payload sources (HTTP and in-memory)
//! - Numeric series fetching with sentinel filtering
//! - Fiscal statement reconstruction (monthly records and fiscal-year rollups)
//! - Archival and current holdings parsing, merge, display axis and ranking

pub mod source;
pub mod series;
pub mod fiscal;
pub mod holdings;
pub mod holdings_archive;
pub mod holdings_current;

pub use source::{HttpSource, MemorySource, PayloadSource, SourceRequest};
pub use series::{SeriesFetcher, SeriesRequest};
pub use fiscal::FiscalStatementParser;
pub use holdings::{merge_holdings, EntityNames, HoldingsReportMerger};

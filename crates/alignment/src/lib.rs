//! Series alignment for the macrofeed pipeline.
//!
//! This crate handles:
//! - Outer-joining independently fetched series on a common date bucket
//! - Resolving point-in-time curve snapshots from daily series

pub mod joiner;
pub mod snapshot;

pub use joiner::SeriesJoiner;
pub use snapshot::{CurveSeries, CurveSnapshotResolver};

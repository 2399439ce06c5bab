//! Refresh pipeline for macrofeed.
//!
//! This crate provides:
//! - Concurrent retrieval of every configured payload with per-source isolation
//! - A pure assembly stage turning raw payloads into one output document
//! - Refresh-cycle supersession so a stale cycle never replaces a newer one

pub mod assemble;
pub mod cycle;
pub mod refresh;

#[cfg(test)]
mod fixtures;

pub use assemble::{Assembler, PanelOutput, RefreshOutput, SourceFailure};
pub use cycle::{CycleToken, CycleTracker, LatestOutput};
pub use refresh::{plan_requests, retrieve_all, RawPayloads, Refresher};

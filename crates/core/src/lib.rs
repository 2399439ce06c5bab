//! Core types and configuration for the macrofeed pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Canonical series, fiscal and holdings types
//! - Configuration structures
//! - Common error types
//! - Calendar helpers for ISO date keys and fiscal years

pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

//! Error types for the macrofeed pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the macrofeed pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Retrieval returned a non-success response or could not complete.
    #[error("Source error: {0}")]
    Source(String),

    /// An expected structural marker (header row, date column, payload field) was not found.
    #[error("Structural error: {0}")]
    Structural(String),

    /// Parsing succeeded but produced no usable records.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Error::Source(msg.into())
    }

    /// Create a structural error.
    pub fn structural(msg: impl Into<String>) -> Self {
        Error::Structural(msg.into())
    }

    /// Create an empty-result error.
    pub fn empty_result(msg: impl Into<String>) -> Self {
        Error::EmptyResult(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Short machine-readable kind, used when failures are reported per source.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Source(_) => "source",
            Error::Structural(_) => "structural",
            Error::EmptyResult(_) => "empty_result",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

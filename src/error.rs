//! Error taxonomy for the regime pipeline.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, RegimeError>;

#[derive(Error, Debug)]
pub enum RegimeError {
    /// Unknown data source selector, bad dates or horizons
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller passed arguments a component cannot work with
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing columns, empty tables, non-positive prices
    #[error("data shape error: {0}")]
    DataShape(String),

    /// Remote fetch failed or cache-only run without a cache file
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Panel series out of alignment; unreachable in correct operation
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegimeError {
    pub fn is_fatal_invariant(&self) -> bool {
        matches!(self, RegimeError::InvariantViolation(_))
    }
}

impl From<reqwest::Error> for RegimeError {
    fn from(err: reqwest::Error) -> Self {
        RegimeError::Retrieval(err.to_string())
    }
}

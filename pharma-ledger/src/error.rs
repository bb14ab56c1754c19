//! Error types for batch tracking

use thiserror::Error;

/// Result type for registry, ledger and workflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Required field missing or blank, or an unknown stage
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Batch does not exist
    #[error("Batch not found: {0}")]
    NotFound(String),

    /// Batch ID already registered
    #[error("Batch already exists: {0}")]
    DuplicateBatch(String),

    /// Store unavailable or write failed
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl Error {
    /// Short machine-readable kind, also used as a metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound(_) => "not_found",
            Error::DuplicateBatch(_) => "duplicate_batch",
            Error::Persistence(_) => "persistence",
        }
    }
}

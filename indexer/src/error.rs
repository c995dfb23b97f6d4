//! Error types for the indexing pipeline.
//!
//! Every fallible operation in the crate surfaces an [`IndexerError`]. The
//! variants are coarse on purpose: they are what the HTTP layer maps to
//! status codes, so each one corresponds to a distinct caller-visible
//! outcome rather than to an internal module.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while resolving, fetching, or indexing a vault.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// A required identifier or query parameter was missing or empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The vault suffix or factory id is not in the endpoint allow-list.
    #[error("not whitelisted: {0}")]
    NotWhitelisted(String),

    /// The RPC node could not be reached or rejected the call.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The contract returned bytes that are not a valid vault state.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The document store failed to read or write.
    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] StoreError),
}

impl IndexerError {
    /// Short, stable label for the error kind. Used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexerError::InvalidInput(_) => "invalid_input",
            IndexerError::NotWhitelisted(_) => "not_whitelisted",
            IndexerError::FetchFailed(_) => "fetch_failed",
            IndexerError::DecodeFailed(_) => "decode_failed",
            IndexerError::PersistenceFailed(_) => "persistence_failed",
        }
    }
}

pub type IndexerResult<T> = Result<T, IndexerError>;

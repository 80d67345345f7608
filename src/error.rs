//! Caller-visible error taxonomy
//!
//! Only caller-input errors and index-construction failures surface here.
//! External service failures (embedding, completion, reranking) degrade
//! inside their stage and are logged, never propagated.

use thiserror::Error;

/// Errors returned by the search pipeline
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query string was empty or blank; rejected before any stage runs
    #[error("query must not be empty or blank")]
    InvalidQuery,

    /// The caller cancelled the query via its cancellation token
    #[error("search cancelled by caller")]
    Cancelled,

    /// Index construction failed during ingest
    #[error("index error: {0}")]
    Index(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for pipeline operations
pub type SearchResult<T> = Result<T, SearchError>;

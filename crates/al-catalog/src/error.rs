//! Catalog error types.

use thiserror::Error;

/// Errors from loading the catalog or talking to the embedding service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid catalog data: {0}")]
    Parse(String),

    #[error("catalog is empty")]
    Empty,

    #[error("catalog source not found: {0}")]
    NotFound(String),

    #[error("embedding service error: {0}")]
    Embedding(String),
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;

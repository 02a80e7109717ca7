//! Error types for document store operations.

use thiserror::Error;

/// Errors raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named collection does not exist.
    #[error("unknown collection: {name}")]
    UnknownCollection { name: String },

    /// A document with the same id already exists.
    #[error("duplicate document id {id} in collection {collection}")]
    DuplicateId { collection: String, id: i64 },

    /// A document was not an object, or its `_id` field was missing or
    /// not an integer.
    #[error("invalid document: {message}")]
    InvalidDocument { message: String },

    /// Backend-specific failure (connection loss, disk error).
    #[error("store backend error: {0}")]
    Backend(#[from] std::io::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create an InvalidDocument error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }
}

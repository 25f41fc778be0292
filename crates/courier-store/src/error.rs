//! Storage errors.

use thiserror::Error;

/// Errors produced by store operations.
///
/// The first three variants map directly onto the HTTP taxonomy (400, 403,
/// 404); the rest surface as internal errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or malformed required input.
    #[error("{0}")]
    Validation(String),

    /// No accepted connection between the pair.
    #[error("no accepted connection between these users")]
    PermissionDenied,

    /// Unknown record id.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value that should be well-formed is not.
    #[error("corrupt stored value: {0}")]
    Decode(String),
}

impl StoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        StoreError::Decode(msg.into())
    }
}

//! Error types for bulk execution.

use oxide_bulk_core::BulkError;

/// Errors that can occur while running a bulk operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation was rejected before any SQL was sent.
    #[error("Compile error: {0}")]
    Compile(#[from] BulkError),

    /// The database rejected the statement or the connection failed. The
    /// server diagnostic is carried unchanged.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A returned row did not have the expected shape.
    #[error("Unexpected result from '{table}': {message}")]
    Decode {
        /// Target table.
        table: String,
        /// What went wrong.
        message: String,
    },
}

impl Error {
    /// Returns the engine-side error, if this is one.
    #[must_use]
    pub const fn as_database(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for bulk operations.
pub type Result<T> = std::result::Result<T, Error>;

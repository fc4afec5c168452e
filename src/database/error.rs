//! Error types for book database operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::book::BookId;

/// Errors raised by a book database or its entries.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File system error while copying content in or out.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Copying content into the store failed.
    #[error("could not copy {from} to {to}: {source}")]
    Copy {
        /// File being copied in.
        from: PathBuf,
        /// Destination inside the store.
        to: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// No entry exists for the book.
    #[error("no database entry for book {book_id}")]
    NotFound {
        /// The missing book.
        book_id: BookId,
    },

    /// The operation does not apply to this format.
    #[error("operation '{operation}' is not supported for {format} content")]
    UnsupportedOperation {
        /// What was attempted.
        operation: &'static str,
        /// Format label.
        format: &'static str,
    },

    /// Backend-specific storage failure.
    #[error("book storage failed: {message}")]
    Storage {
        /// Description from the backend.
        message: String,
    },
}

impl DatabaseError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a copy error naming both ends.
    pub fn copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Copy {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

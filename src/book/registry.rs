//! Last-write-wins store of the current status of each book.

use dashmap::DashMap;
use tracing::debug;

use super::{Book, BookId, BookStatus};

/// A book together with its current status.
#[derive(Debug, Clone)]
pub struct BookWithStatus {
    /// The book as last published.
    pub book: Book,
    /// Its current status.
    pub status: BookStatus,
}

/// Receives status transitions. Fire-and-forget: no acknowledgment.
pub trait BookRegistry: Send + Sync {
    /// Replaces the current status of `book`.
    fn update(&self, book: &Book, status: BookStatus);

    /// Returns the last published book and status.
    fn book_or_none(&self, id: &BookId) -> Option<BookWithStatus>;
}

/// Registry backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBookRegistry {
    books: DashMap<BookId, BookWithStatus>,
}

impl InMemoryBookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current status of a book.
    #[must_use]
    pub fn status(&self, id: &BookId) -> Option<BookStatus> {
        self.books.get(id).map(|entry| entry.status.clone())
    }
}

impl BookRegistry for InMemoryBookRegistry {
    fn update(&self, book: &Book, status: BookStatus) {
        debug!(book_id = %book.id, status = status.as_str(), "book status updated");
        self.books.insert(
            book.id.clone(),
            BookWithStatus {
                book: book.clone(),
                status,
            },
        );
    }

    fn book_or_none(&self, id: &BookId) -> Option<BookWithStatus> {
        self.books.get(id).map(|entry| entry.value().clone())
    }
}

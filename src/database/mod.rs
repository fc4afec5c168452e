//! Contract of the per-account book database.
//!
//! The pipeline only reads and writes through these traits. Implementations
//! must be safe for concurrent use: other parts of an application may read an
//! entry while a borrow writes to it, so callers re-read through the entry
//! instead of caching field values across steps.

mod error;
mod memory;

pub use error::DatabaseError;
pub use memory::InMemoryBookDatabase;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::account::AccountId;
use crate::book::{Book, BookFormat, BookId, DrmKind, FormatKind};
use crate::catalog::CatalogEntry;

/// A per-account store of book entries.
#[async_trait]
pub trait BookDatabase: Send + Sync {
    /// Creates the entry for `id`, or refreshes its catalog entry if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if the entry cannot be written.
    async fn create_or_update(
        &self,
        id: &BookId,
        account: &AccountId,
        entry: &CatalogEntry,
    ) -> Result<Arc<dyn BookDatabaseEntry>, DatabaseError>;

    /// Returns the existing entry for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotFound`] when there is none.
    async fn entry(&self, id: &BookId) -> Result<Arc<dyn BookDatabaseEntry>, DatabaseError>;
}

/// The persisted record of one book.
#[async_trait]
pub trait BookDatabaseEntry: Send + Sync {
    /// Snapshot of the book as currently stored.
    fn book(&self) -> Book;

    /// Replaces the stored catalog entry (e.g. after a loan refreshes it).
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if the entry cannot be written.
    async fn write_catalog_entry(&self, entry: &CatalogEntry) -> Result<(), DatabaseError>;

    /// Returns the handle for one format, if the entry has it.
    fn format_handle(&self, kind: FormatKind) -> Option<Arc<dyn BookFormatHandle>>;
}

/// Operations on one format of an entry.
#[async_trait]
pub trait BookFormatHandle: Send + Sync {
    /// Which format this handle addresses.
    fn kind(&self) -> FormatKind;

    /// Snapshot of the format's state.
    fn format(&self) -> BookFormat;

    /// Copies a downloaded file into the database.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] on copy failure or for non-file formats.
    async fn copy_in_book(&self, file: &Path) -> Result<(), DatabaseError>;

    /// Stores a manifest document and the address it was fetched from.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] on write failure or for non-manifest formats.
    async fn copy_in_manifest_and_uri(&self, data: &[u8], uri: &Url) -> Result<(), DatabaseError>;

    /// Returns the stored manifest document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] when the stored bytes cannot be read.
    async fn stored_manifest(&self) -> Result<Option<Vec<u8>>, DatabaseError>;

    /// Records the DRM protecting this format.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if the change cannot be persisted.
    async fn set_drm_kind(&self, drm: DrmKind) -> Result<(), DatabaseError>;

    /// Persists a reading or listening position.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if the position cannot be persisted.
    async fn save_last_read_location(&self, location: &str) -> Result<(), DatabaseError>;
}

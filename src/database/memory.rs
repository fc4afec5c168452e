//! Book database keeping metadata in memory and content files in a directory.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::{BookDatabase, BookDatabaseEntry, BookFormatHandle, DatabaseError};
use crate::account::AccountId;
use crate::acquisition::linearize;
use crate::book::{Book, BookFormat, BookId, DrmKind, FormatKind};
use crate::catalog::CatalogEntry;

/// Database whose entries live in memory; copied-in files go under `directory`.
#[derive(Debug)]
pub struct InMemoryBookDatabase {
    directory: PathBuf,
    entries: Mutex<HashMap<BookId, Arc<MemoryEntry>>>,
}

impl InMemoryBookDatabase {
    /// Creates an empty database storing content files under `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Returns true when no entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<BookId, Arc<MemoryEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BookDatabase for InMemoryBookDatabase {
    #[instrument(skip(self, entry), fields(book_id = %id))]
    async fn create_or_update(
        &self,
        id: &BookId,
        account: &AccountId,
        entry: &CatalogEntry,
    ) -> Result<Arc<dyn BookDatabaseEntry>, DatabaseError> {
        let mut entries = self.lock_entries();
        if let Some(existing) = entries.get(id) {
            debug!("refreshing existing database entry");
            existing.replace_catalog_entry(entry);
            let existing: Arc<dyn BookDatabaseEntry> = existing.clone();
            return Ok(existing);
        }

        debug!("creating database entry");
        let state = EntryState {
            book: Book {
                id: id.clone(),
                account: account.clone(),
                entry: entry.clone(),
                formats: formats_for(entry, &[]),
            },
            manifest: None,
        };
        let created = Arc::new(MemoryEntry {
            directory: self.directory.clone(),
            state: Arc::new(Mutex::new(state)),
        });
        entries.insert(id.clone(), created.clone());
        let created: Arc<dyn BookDatabaseEntry> = created;
        Ok(created)
    }

    async fn entry(&self, id: &BookId) -> Result<Arc<dyn BookDatabaseEntry>, DatabaseError> {
        self.lock_entries()
            .get(id)
            .cloned()
            .map(|entry| entry as Arc<dyn BookDatabaseEntry>)
            .ok_or_else(|| DatabaseError::NotFound {
                book_id: id.clone(),
            })
    }
}

/// Formats implied by the entry's acquisition paths, keeping existing state.
fn formats_for(entry: &CatalogEntry, existing: &[BookFormat]) -> Vec<BookFormat> {
    let mut seen = HashSet::new();
    let mut formats = Vec::new();
    for path in linearize(&entry.acquisitions) {
        let Some(kind) = FormatKind::for_content_type(path.final_content_type()) else {
            continue;
        };
        if seen.insert(kind) {
            formats.push(
                existing
                    .iter()
                    .find(|format| format.kind == kind)
                    .cloned()
                    .unwrap_or_else(|| BookFormat::empty(kind)),
            );
        }
    }
    // formats that already hold content survive an entry refresh
    for format in existing {
        if !seen.contains(&format.kind) && format.is_downloaded() {
            formats.push(format.clone());
        }
    }
    formats
}

#[derive(Debug)]
struct EntryState {
    book: Book,
    manifest: Option<Vec<u8>>,
}

#[derive(Debug)]
struct MemoryEntry {
    directory: PathBuf,
    state: Arc<Mutex<EntryState>>,
}

impl MemoryEntry {
    fn lock(&self) -> std::sync::MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_catalog_entry(&self, entry: &CatalogEntry) {
        let mut state = self.lock();
        state.book.formats = formats_for(entry, &state.book.formats);
        state.book.entry = entry.clone();
    }
}

#[async_trait]
impl BookDatabaseEntry for MemoryEntry {
    fn book(&self) -> Book {
        self.lock().book.clone()
    }

    async fn write_catalog_entry(&self, entry: &CatalogEntry) -> Result<(), DatabaseError> {
        self.replace_catalog_entry(entry);
        Ok(())
    }

    fn format_handle(&self, kind: FormatKind) -> Option<Arc<dyn BookFormatHandle>> {
        let state = self.lock();
        state.book.format(kind)?;
        Some(Arc::new(MemoryFormatHandle {
            kind,
            book_id: state.book.id.clone(),
            directory: self.directory.clone(),
            state: self.state.clone(),
        }))
    }
}

struct MemoryFormatHandle {
    kind: FormatKind,
    book_id: BookId,
    directory: PathBuf,
    state: Arc<Mutex<EntryState>>,
}

impl MemoryFormatHandle {
    fn update(&self, apply: impl FnOnce(&mut BookFormat, &mut Option<Vec<u8>>)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let EntryState { book, manifest } = &mut *state;
        if let Some(format) = book.formats.iter_mut().find(|format| format.kind == self.kind) {
            apply(format, manifest);
        }
    }

    fn unsupported(&self, operation: &'static str) -> DatabaseError {
        DatabaseError::UnsupportedOperation {
            operation,
            format: self.kind.as_str(),
        }
    }
}

#[async_trait]
impl BookFormatHandle for MemoryFormatHandle {
    fn kind(&self) -> FormatKind {
        self.kind
    }

    fn format(&self) -> BookFormat {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .book
            .format(self.kind)
            .cloned()
            .unwrap_or_else(|| BookFormat::empty(self.kind))
    }

    #[instrument(skip(self), fields(book_id = %self.book_id, format = self.kind.as_str()))]
    async fn copy_in_book(&self, file: &Path) -> Result<(), DatabaseError> {
        let extension = match self.kind {
            FormatKind::Epub => "epub",
            FormatKind::Pdf => "pdf",
            FormatKind::AudioBook => return Err(self.unsupported("copy_in_book")),
        };
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| DatabaseError::io(self.directory.clone(), e))?;
        let destination = self.directory.join(format!("{}.{extension}", self.book_id));
        tokio::fs::copy(file, &destination)
            .await
            .map_err(|e| DatabaseError::copy(file, &destination, e))?;
        debug!(destination = %destination.display(), "book content copied in");

        self.update(|format, _| format.file = Some(destination));
        Ok(())
    }

    async fn copy_in_manifest_and_uri(&self, data: &[u8], uri: &Url) -> Result<(), DatabaseError> {
        if self.kind != FormatKind::AudioBook {
            return Err(self.unsupported("copy_in_manifest_and_uri"));
        }
        let data = data.to_vec();
        let uri = uri.clone();
        self.update(move |format, manifest| {
            format.manifest_uri = Some(uri);
            format.manifest_bytes = Some(data.len());
            *manifest = Some(data);
        });
        Ok(())
    }

    async fn stored_manifest(&self) -> Result<Option<Vec<u8>>, DatabaseError> {
        if self.kind != FormatKind::AudioBook {
            return Ok(None);
        }
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.manifest.clone())
    }

    async fn set_drm_kind(&self, drm: DrmKind) -> Result<(), DatabaseError> {
        self.update(|format, _| format.drm = drm);
        Ok(())
    }

    async fn save_last_read_location(&self, location: &str) -> Result<(), DatabaseError> {
        let location = location.to_string();
        self.update(move |format, _| format.last_read_location = Some(location));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{AcquisitionOffer, AcquisitionRelation, Availability};
    use crate::mime::{self, MimeType};
    use tempfile::TempDir;

    fn entry(types: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id: "urn:book".to_string(),
            title: "Book".to_string(),
            authors: vec![],
            availability: Availability::Available,
            acquisitions: types
                .iter()
                .map(|t| AcquisitionOffer {
                    relation: AcquisitionRelation::OpenAccess,
                    target: Url::parse("https://cdn.example/book").unwrap(),
                    content_type: MimeType::parse(t).unwrap(),
                    indirect: vec![],
                })
                .collect(),
            cover: None,
            thumbnail: None,
        }
    }

    #[tokio::test]
    async fn test_create_or_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db = InMemoryBookDatabase::new(dir.path());
        let id = BookId::from_entry_id("urn:book");
        let account = AccountId::new("acc");

        db.create_or_update(&id, &account, &entry(&[mime::EPUB]))
            .await
            .unwrap();
        let second = db
            .create_or_update(&id, &account, &entry(&[mime::EPUB, mime::PDF]))
            .await
            .unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(second.book().formats.len(), 2);
    }

    #[tokio::test]
    async fn test_copy_in_book_records_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("download.tmp");
        tokio::fs::write(&source, b"epub bytes").await.unwrap();

        let db = InMemoryBookDatabase::new(dir.path().join("books"));
        let id = BookId::from_entry_id("urn:book");
        let entry = db
            .create_or_update(&id, &AccountId::new("acc"), &entry(&[mime::EPUB]))
            .await
            .unwrap();
        let handle = entry.format_handle(FormatKind::Epub).unwrap();
        handle.copy_in_book(&source).await.unwrap();

        let stored = handle.format().file.unwrap();
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"epub bytes");
        assert!(entry.book().is_downloaded());
    }

    #[tokio::test]
    async fn test_copy_failure_names_destination() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("download.tmp");
        tokio::fs::write(&source, b"epub bytes").await.unwrap();

        let books = dir.path().join("books");
        let db = InMemoryBookDatabase::new(&books);
        let id = BookId::from_entry_id("urn:book");
        let blocked = books.join(format!("{id}.epub"));
        tokio::fs::create_dir_all(&blocked).await.unwrap();
        let entry = db
            .create_or_update(&id, &AccountId::new("acc"), &entry(&[mime::EPUB]))
            .await
            .unwrap();

        let err = entry
            .format_handle(FormatKind::Epub)
            .unwrap()
            .copy_in_book(&source)
            .await
            .unwrap_err();
        match &err {
            DatabaseError::Copy { from, to, .. } => {
                assert_eq!(from, &source);
                assert_eq!(to, &blocked);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains(&blocked.display().to_string()), "{err}");
        assert!(!entry.book().is_downloaded());
    }

    #[tokio::test]
    async fn test_manifest_only_for_audio_format() {
        let dir = TempDir::new().unwrap();
        let db = InMemoryBookDatabase::new(dir.path());
        let id = BookId::from_entry_id("urn:book");
        let entry = db
            .create_or_update(
                &id,
                &AccountId::new("acc"),
                &entry(&[mime::EPUB, mime::AUDIOBOOK_MANIFEST]),
            )
            .await
            .unwrap();
        let uri = Url::parse("https://cdn.example/manifest").unwrap();

        let epub = entry.format_handle(FormatKind::Epub).unwrap();
        assert!(matches!(
            epub.copy_in_manifest_and_uri(b"{}", &uri).await,
            Err(DatabaseError::UnsupportedOperation { .. })
        ));

        let audio = entry.format_handle(FormatKind::AudioBook).unwrap();
        audio.copy_in_manifest_and_uri(b"{}", &uri).await.unwrap();
        assert_eq!(audio.stored_manifest().await.unwrap().unwrap(), b"{}");
        assert_eq!(audio.format().manifest_uri, Some(uri));
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let db = InMemoryBookDatabase::new(std::env::temp_dir());
        let result = db.entry(&BookId::from_entry_id("nope")).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_drm_and_location_persisted() {
        let db = InMemoryBookDatabase::new(std::env::temp_dir());
        let id = BookId::from_entry_id("urn:book");
        let entry = db
            .create_or_update(&id, &AccountId::new("acc"), &entry(&[mime::PDF]))
            .await
            .unwrap();
        let handle = entry.format_handle(FormatKind::Pdf).unwrap();
        handle.set_drm_kind(DrmKind::Adobe).await.unwrap();
        handle.save_last_read_location("page=4").await.unwrap();
        let format = handle.format();
        assert_eq!(format.drm, DrmKind::Adobe);
        assert_eq!(format.last_read_location.as_deref(), Some("page=4"));
    }
}

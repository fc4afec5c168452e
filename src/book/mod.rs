//! Books and their locally known formats.

mod registry;
mod status;

pub use registry::{BookRegistry, BookWithStatus, InMemoryBookRegistry};
pub use status::BookStatus;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::account::AccountId;
use crate::catalog::CatalogEntry;
use crate::mime::MimeType;

/// Opaque, stable book identifier.
///
/// Derived from the catalog entry ID so that borrowing the same entry twice
/// addresses the same database record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    /// Hashes a catalog entry ID into a book ID.
    #[must_use]
    pub fn from_entry_id(entry_id: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(entry_id.as_bytes())))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of local content a book can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// EPUB file.
    Epub,
    /// PDF file.
    Pdf,
    /// Audio manifest.
    AudioBook,
}

impl FormatKind {
    /// Maps a final content type onto the format that stores it.
    #[must_use]
    pub fn for_content_type(content_type: &MimeType) -> Option<Self> {
        if content_type.is(crate::mime::EPUB) {
            Some(Self::Epub)
        } else if content_type.is(crate::mime::PDF) {
            Some(Self::Pdf)
        } else if content_type.is_audio_manifest() {
            Some(Self::AudioBook)
        } else {
            None
        }
    }

    /// Stable label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::AudioBook => "audio_book",
        }
    }
}

/// DRM protecting a format's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrmKind {
    /// Unprotected.
    #[default]
    None,
    /// Adobe ACS.
    Adobe,
    /// Readium LCP.
    Lcp,
}

/// Locally known state of one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFormat {
    /// Which format this is.
    pub kind: FormatKind,
    /// Downloaded file, for file-backed formats.
    pub file: Option<PathBuf>,
    /// Where the stored manifest was fetched from.
    pub manifest_uri: Option<Url>,
    /// Size of the stored manifest in bytes.
    pub manifest_bytes: Option<usize>,
    /// DRM protecting the content.
    pub drm: DrmKind,
    /// Last saved reading or listening position.
    pub last_read_location: Option<String>,
}

impl BookFormat {
    /// Creates an empty format of `kind`.
    #[must_use]
    pub fn empty(kind: FormatKind) -> Self {
        Self {
            kind,
            file: None,
            manifest_uri: None,
            manifest_bytes: None,
            drm: DrmKind::None,
            last_read_location: None,
        }
    }

    /// Returns true once content has been copied in.
    #[must_use]
    pub fn is_downloaded(&self) -> bool {
        self.file.is_some() || self.manifest_uri.is_some()
    }
}

/// A work as the pipeline and the status registry see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    /// Stable identifier.
    pub id: BookId,
    /// Owning account.
    pub account: AccountId,
    /// Catalog entry the book was borrowed from.
    pub entry: CatalogEntry,
    /// Locally known formats.
    pub formats: Vec<BookFormat>,
}

impl Book {
    /// Builds a book value before any database entry exists.
    #[must_use]
    pub fn synthesize(account: AccountId, entry: CatalogEntry) -> Self {
        Self {
            id: BookId::from_entry_id(&entry.id),
            account,
            entry,
            formats: Vec::new(),
        }
    }

    /// Returns the format of `kind`, if known.
    #[must_use]
    pub fn format(&self, kind: FormatKind) -> Option<&BookFormat> {
        self.formats.iter().find(|format| format.kind == kind)
    }

    /// Returns true if any format holds content.
    #[must_use]
    pub fn is_downloaded(&self) -> bool {
        self.formats.iter().any(BookFormat::is_downloaded)
    }
}

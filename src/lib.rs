//! Borrow Engine Core Library
//!
//! Turns a catalog entry into locally available content for a library reader:
//! pick a supported acquisition path, then walk it (loan, token exchange, DRM
//! fulfillment, download or manifest fulfillment), publishing the book's
//! status along the way and recording every step for the caller.
//!
//! # Architecture
//!
//! - [`acquisition`] - Linearizes offers into paths and picks the first supported one
//! - [`borrow`] - The borrow pipeline, subtask registry and built-in subtasks
//! - [`manifest`] - Audio manifest download, parsing and license checks
//! - [`task`] - Step recorder, task results and error codes
//! - [`book`], [`account`], [`database`] - Domain types and their stores
//! - [`http`] - Streaming HTTP client used by every subtask

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod account;
pub mod acquisition;
pub mod book;
pub mod borrow;
pub mod bundled;
pub mod cancel;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod database;
pub mod drm;
pub mod events;
pub mod http;
pub mod manifest;
pub mod mime;
pub mod task;

// Re-export commonly used types
pub use account::{
    Account, AccountCapabilities, AccountCredentials, AccountId, InMemoryProfileDirectory,
    Profile, ProfileDirectory, ProfileId,
};
pub use acquisition::{AcquisitionPath, PathElement, pick_best};
pub use book::{Book, BookId, BookRegistry, BookStatus, InMemoryBookRegistry};
pub use borrow::{
    BorrowCompletion, BorrowRequest, BorrowServices, BorrowTask, SubtaskRegistry,
    build_default_subtask_registry,
};
pub use catalog::{AcquisitionOffer, Availability, CatalogEntry};
pub use config::{BorrowConfig, ConfigError};
pub use database::{BookDatabase, InMemoryBookDatabase};
pub use events::{EventSender, PipelineEvent};
pub use manifest::{ManifestFulfillment, ManifestRequest};
pub use mime::MimeType;
pub use task::{ErrorCode, TaskRecorder, TaskResult, TaskStep};

//! Built-in subtasks and the default registry wiring them up.

mod acsm;
mod audio_book;
mod bearer_token;
mod bundled;
mod direct_download;
mod loan_create;
mod saml_download;

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

pub use acsm::AdobeAcsmSubtaskFactory;
pub use audio_book::AudioBookSubtaskFactory;
pub use bearer_token::BearerTokenSubtaskFactory;
pub use bundled::BundledContentSubtaskFactory;
pub use direct_download::DirectDownloadSubtaskFactory;
pub use loan_create::LoanCreateSubtaskFactory;
pub use saml_download::SamlDownloadSubtaskFactory;

use super::context::BorrowContext;
use super::registry::SubtaskRegistry;
use super::subtask::{SubtaskError, SubtaskPriority};
use crate::book::{BookStatus, FormatKind};
use crate::bundled::BUNDLED_SCHEME;
use crate::database::{BookFormatHandle, DatabaseError};
use crate::events::PipelineEvent;
use crate::http::{DownloadProgress, HttpError, HttpStream};
use crate::mime::{self, MimeType};
use crate::task::ErrorCode;

/// Builds the registry of built-in subtasks.
///
/// Registration order matters only within a priority level.
#[must_use]
pub fn build_default_subtask_registry() -> SubtaskRegistry {
    let mut registry = SubtaskRegistry::new();
    registry.register(
        SubtaskPriority::Specialized,
        |query| query.target.is_some_and(|target| target.scheme() == BUNDLED_SCHEME),
        Arc::new(BundledContentSubtaskFactory),
    );
    registry.register(
        SubtaskPriority::General,
        |query| query.content_type.is(mime::OPDS_PUBLICATION),
        Arc::new(LoanCreateSubtaskFactory),
    );
    registry.register(
        SubtaskPriority::General,
        |query| query.content_type.is(mime::BEARER_TOKEN),
        Arc::new(BearerTokenSubtaskFactory),
    );
    registry.register(
        SubtaskPriority::Specialized,
        |query| query.account.capabilities.supports_saml && is_book_file(query.content_type),
        Arc::new(SamlDownloadSubtaskFactory),
    );
    registry.register(
        SubtaskPriority::General,
        |query| query.content_type.is(mime::ADOBE_ACSM),
        Arc::new(AdobeAcsmSubtaskFactory),
    );
    registry.register(
        SubtaskPriority::General,
        |query| query.content_type.is_audio_manifest(),
        Arc::new(AudioBookSubtaskFactory),
    );
    registry.register(
        SubtaskPriority::Fallback,
        |query| is_book_file(query.content_type),
        Arc::new(DirectDownloadSubtaskFactory),
    );
    registry
}

fn is_book_file(content_type: &MimeType) -> bool {
    content_type.is(mime::EPUB) || content_type.is(mime::PDF)
}

fn require_target(ctx: &BorrowContext<'_>) -> Result<Url, SubtaskError> {
    ctx.current_target().cloned().ok_or_else(|| {
        SubtaskError::failed(
            "No target address is known for this acquisition step",
            ErrorCode::MissingTargetAddress,
        )
    })
}

fn require_content_type(ctx: &BorrowContext<'_>) -> Result<MimeType, SubtaskError> {
    ctx.current_element()
        .map(|element| element.content_type.clone())
        .ok_or_else(|| SubtaskError::failed("No acquisition step is active", ErrorCode::Unexpected))
}

/// Accepts a response declaring `expected`, a generic binary type, or no type.
fn check_response_type(
    expected: &MimeType,
    received: Option<&MimeType>,
) -> Result<(), SubtaskError> {
    match received {
        Some(received)
            if !received.is(&expected.full_type()) && !received.is(mime::OCTET_STREAM) =>
        {
            Err(SubtaskError::failed(
                format!(
                    "Expected {} but the server sent {}",
                    expected.full_type(),
                    received.full_type()
                ),
                ErrorCode::ContentTypeMismatch,
            ))
        }
        _ => Ok(()),
    }
}

fn http_failure(context: &str, error: HttpError) -> SubtaskError {
    let code = match &error {
        HttpError::Cancelled { .. } => return SubtaskError::Cancelled,
        HttpError::AuthRequired { .. } => ErrorCode::HttpAuthRequired,
        HttpError::Io { .. } | HttpError::TemporaryFileExhausted { .. } => ErrorCode::IoFailure,
        _ => ErrorCode::HttpRequestFailed,
    };
    SubtaskError::failed_with(format!("{context}: {error}"), code, error)
}

fn database_failure(context: &str, error: DatabaseError) -> SubtaskError {
    SubtaskError::failed_with(
        format!("{context}: {error}"),
        ErrorCode::DatabaseFailure,
        error,
    )
}

fn format_handle(
    ctx: &BorrowContext<'_>,
    kind: FormatKind,
) -> Result<Arc<dyn BookFormatHandle>, SubtaskError> {
    ctx.entry().format_handle(kind).ok_or_else(|| {
        SubtaskError::failed(
            format!("The book has no {} format to store content in", kind.as_str()),
            ErrorCode::DatabaseFailure,
        )
    })
}

/// Streams a response body to a temporary file and copies it into `kind`.
///
/// Publishes `Downloading` transitions and progress events along the way.
/// The temporary file is removed once copied.
async fn download_into_format(
    ctx: &BorrowContext<'_>,
    stream: HttpStream,
    kind: FormatKind,
) -> Result<(), SubtaskError> {
    let services = ctx.services();
    let book = ctx.entry().book();
    let book_id = book.id.clone();
    let mut on_progress = |progress: DownloadProgress| {
        services.book_registry.update(
            &book,
            BookStatus::Downloading {
                received: progress.received,
                expected: progress.expected,
                bytes_per_second: progress.bytes_per_second,
            },
        );
        services.events.emit(PipelineEvent::DownloadProgress {
            book_id: book_id.clone(),
            received: progress.received,
            expected: progress.expected,
            bytes_per_second: progress.bytes_per_second,
        });
    };

    let downloaded = stream
        .save_to_temporary_file(&services.http, ctx.cancel_flag(), &mut on_progress)
        .await
        .map_err(|e| http_failure("Download failed", e))?;

    let handle = format_handle(ctx, kind)?;
    let copied = handle.copy_in_book(&downloaded.path).await;
    remove_temporary_file(&downloaded.path).await;
    copied.map_err(|e| database_failure("Could not store the downloaded book", e))?;

    debug!(bytes = downloaded.bytes, kind = kind.as_str(), "book stored");
    Ok(())
}

async fn remove_temporary_file(path: &std::path::Path) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %error, "failed to remove temporary file");
    }
}

//! Copies content shipped with the client straight into the database.

use async_trait::async_trait;
use tracing::instrument;

use super::{database_failure, format_handle, require_content_type, require_target};
use crate::book::FormatKind;
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::task::ErrorCode;

/// Creates [`BundledContentSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledContentSubtaskFactory;

impl SubtaskFactory for BundledContentSubtaskFactory {
    fn name(&self) -> &'static str {
        "bundled-content"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(BundledContentSubtask)
    }
}

/// Resolves a `simplified-bundled:` target to a local file and copies it in.
#[derive(Debug)]
pub struct BundledContentSubtask;

#[async_trait]
impl Subtask for BundledContentSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        ctx.recorder().begin_new_step("Copying bundled content");
        let target = require_target(ctx)?;
        let content_type = require_content_type(ctx)?;

        let Some(resolver) = ctx.services().bundled.as_ref() else {
            return Err(SubtaskError::failed(
                "This client has no bundled content",
                ErrorCode::BundledContentMissing,
            ));
        };
        let Some(file) = resolver.resolve(&target) else {
            return Err(SubtaskError::failed(
                format!("Bundled content {target} is missing"),
                ErrorCode::BundledContentMissing,
            ));
        };
        let Some(kind) = FormatKind::for_content_type(&content_type) else {
            return Err(SubtaskError::failed(
                format!("Bundled content of type {content_type} cannot be stored"),
                ErrorCode::ContentTypeMismatch,
            ));
        };

        format_handle(ctx, kind)?
            .copy_in_book(&file)
            .await
            .map_err(|e| database_failure("Could not store bundled content", e))?;
        ctx.recorder()
            .current_step_succeeded(format!("Copied {}", file.display()));
        Ok(())
    }
}

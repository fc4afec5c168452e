//! Plain HTTP download of an EPUB or PDF.

use async_trait::async_trait;
use tracing::instrument;

use super::{
    check_response_type, download_into_format, http_failure, require_content_type,
    require_target,
};
use crate::book::FormatKind;
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::http::HttpRequest;
use crate::task::ErrorCode;

/// Creates [`DirectDownloadSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDownloadSubtaskFactory;

impl SubtaskFactory for DirectDownloadSubtaskFactory {
    fn name(&self) -> &'static str {
        "direct-download"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(DirectDownloadSubtask)
    }
}

/// Downloads the book file and copies it into its format.
///
/// The response must declare the expected type, a generic binary type, or
/// no type at all.
#[derive(Debug)]
pub struct DirectDownloadSubtask;

#[async_trait]
impl Subtask for DirectDownloadSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        let content_type = require_content_type(ctx)?;
        ctx.recorder()
            .begin_new_step(format!("Downloading {}", content_type.full_type()));
        let target = require_target(ctx)?;
        let Some(kind) = FormatKind::for_content_type(&content_type) else {
            return Err(SubtaskError::failed(
                format!("Content of type {content_type} cannot be stored"),
                ErrorCode::ContentTypeMismatch,
            ));
        };

        let request = HttpRequest::get(target).with_auth(ctx.http_auth());
        let stream = ctx
            .services()
            .http
            .send(request)
            .await
            .map_err(|e| http_failure("Download failed", e))?;

        check_response_type(&content_type, stream.content_type().as_ref())?;

        download_into_format(ctx, stream, kind).await?;
        ctx.recorder().current_step_succeeded("Book downloaded");
        Ok(())
    }
}

//! Downloads through a SAML session, deferring to the user when signed out.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{
    check_response_type, download_into_format, http_failure, require_content_type,
    require_target,
};
use crate::book::{BookStatus, FormatKind};
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::http::HttpRequest;
use crate::mime;
use crate::task::ErrorCode;

/// Creates [`SamlDownloadSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamlDownloadSubtaskFactory;

impl SubtaskFactory for SamlDownloadSubtaskFactory {
    fn name(&self) -> &'static str {
        "saml-download"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(SamlDownloadSubtask)
    }
}

/// Downloads a book for an account whose library signs in with SAML.
///
/// An HTML response means the identity provider wants an interactive
/// sign-in: the sign-in page is published and the pipeline halts.
/// Any other response must carry the book's type or a generic binary type.
#[derive(Debug)]
pub struct SamlDownloadSubtask;

#[async_trait]
impl Subtask for SamlDownloadSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        ctx.recorder().begin_new_step("Downloading with SAML session");
        let target = require_target(ctx)?;
        let content_type = require_content_type(ctx)?;
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

        if stream.content_type().is_some_and(|t| t.is(mime::HTML)) {
            let sign_in = stream.url().clone();
            info!(url = %sign_in, "sign-in page returned");
            ctx.recorder()
                .current_step_succeeded("Waiting for the user to sign in");
            ctx.publish_status(BookStatus::DownloadWaitingForExternalAuthentication { url: sign_in });
            return Err(SubtaskError::Halted);
        }
        check_response_type(&content_type, stream.content_type().as_ref())?;

        download_into_format(ctx, stream, kind).await?;
        ctx.recorder().current_step_succeeded("Book downloaded");
        Ok(())
    }
}

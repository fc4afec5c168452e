//! Fulfills Adobe ACSM tokens through the installed DRM connector.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{database_failure, format_handle, http_failure, remove_temporary_file, require_target};
use crate::book::{DrmKind, FormatKind};
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::http::HttpRequest;
use crate::mime;
use crate::task::ErrorCode;

/// Creates [`AdobeAcsmSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdobeAcsmSubtaskFactory;

impl SubtaskFactory for AdobeAcsmSubtaskFactory {
    fn name(&self) -> &'static str {
        "adobe-acsm"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(AdobeAcsmSubtask)
    }
}

/// Downloads an ACSM token and lets the Adobe connector fulfill it.
///
/// The connector produces the protected book itself, so this subtask also
/// consumes the path element that follows the token.
#[derive(Debug)]
pub struct AdobeAcsmSubtask;

#[async_trait]
impl Subtask for AdobeAcsmSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        ctx.recorder().begin_new_step("Fetching ACSM token");
        let Some(connector) = ctx.services().drm.adobe.clone() else {
            return Err(SubtaskError::failed(
                "Adobe DRM is not supported on this client",
                ErrorCode::DrmUnsupported,
            ));
        };
        let target = require_target(ctx)?;

        let request = HttpRequest::get(target)
            .with_auth(ctx.http_auth())
            .with_header("Accept", mime::ADOBE_ACSM);
        let token = ctx
            .services()
            .http
            .execute(request)
            .await
            .map_err(|e| http_failure("ACSM request failed", e))?;
        ctx.recorder()
            .current_step_succeeded(format!("Received {} byte ACSM token", token.body.len()));
        ctx.check_cancelled()?;

        ctx.recorder().begin_new_step("Fulfilling with Adobe DRM");
        let produced = ctx.take_next_element();
        let kind = produced
            .as_ref()
            .and_then(|element| FormatKind::for_content_type(&element.content_type))
            .unwrap_or(FormatKind::Epub);
        let handle = format_handle(ctx, kind)?;

        let directory = ctx.services().config.temporary_directory.clone();
        let file = connector
            .fulfill(&token.body, &directory)
            .await
            .map_err(|e| SubtaskError::failed_with(e.to_string(), ErrorCode::DrmFailed, e))?;
        debug!(path = %file.display(), "ACSM fulfilled");

        let copied = handle.copy_in_book(&file).await;
        remove_temporary_file(&file).await;
        copied.map_err(|e| database_failure("Could not store the fulfilled book", e))?;
        handle
            .set_drm_kind(DrmKind::Adobe)
            .await
            .map_err(|e| database_failure("Could not record the DRM kind", e))?;

        ctx.recorder().current_step_succeeded("Book fulfilled");
        Ok(())
    }
}

//! Exchanges a bearer token document for the address of the real content.

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{http_failure, require_target};
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::http::HttpRequest;
use crate::mime;
use crate::task::ErrorCode;

/// Creates [`BearerTokenSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTokenSubtaskFactory;

impl SubtaskFactory for BearerTokenSubtaskFactory {
    fn name(&self) -> &'static str {
        "bearer-token"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(BearerTokenSubtask)
    }
}

#[derive(Debug, Deserialize)]
struct BearerTokenDocument {
    access_token: String,
    expires_in: i64,
    location: Url,
}

/// Fetches a bearer token document.
///
/// The token authorizes later requests of this borrow until it expires; the
/// document's `location` becomes the next element's target.
#[derive(Debug)]
pub struct BearerTokenSubtask;

#[async_trait]
impl Subtask for BearerTokenSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        ctx.recorder().begin_new_step("Fetching bearer token");
        let target = require_target(ctx)?;

        let request = HttpRequest::get(target.clone())
            .with_auth(ctx.http_auth())
            .with_header("Accept", mime::BEARER_TOKEN);
        let response = ctx
            .services()
            .http
            .execute(request)
            .await
            .map_err(|e| http_failure("Bearer token request failed", e))?;

        let document: BearerTokenDocument =
            serde_json::from_slice(&response.body).map_err(|e| {
                SubtaskError::failed_with(
                    format!("Could not parse the bearer token from {target}"),
                    ErrorCode::ResponseParseFailed,
                    e,
                )
            })?;
        if document.access_token.is_empty() {
            return Err(SubtaskError::failed(
                format!("The bearer token from {target} is empty"),
                ErrorCode::ResponseParseFailed,
            ));
        }

        let Some(expires_at) = Duration::try_seconds(document.expires_in.max(0))
            .and_then(|lifetime| ctx.services().clock.now().checked_add_signed(lifetime))
        else {
            return Err(SubtaskError::failed(
                format!("The bearer token from {target} has an invalid lifetime"),
                ErrorCode::ResponseParseFailed,
            ));
        };
        debug!(%expires_at, location = %document.location, "bearer token obtained");
        ctx.set_bearer_token(document.access_token, expires_at);
        ctx.set_next_target(document.location);
        ctx.recorder()
            .current_step_succeeded(format!("Bearer token valid until {expires_at}"));
        Ok(())
    }
}

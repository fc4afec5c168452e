//! Requests a loan and hands the loaned content address to the next step.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{database_failure, http_failure, require_target};
use crate::book::BookStatus;
use crate::borrow::context::BorrowContext;
use crate::borrow::subtask::{Subtask, SubtaskError, SubtaskFactory};
use crate::catalog::{Availability, CatalogEntry};
use crate::http::HttpRequest;
use crate::mime;
use crate::task::ErrorCode;

/// Creates [`LoanCreateSubtask`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoanCreateSubtaskFactory;

impl SubtaskFactory for LoanCreateSubtaskFactory {
    fn name(&self) -> &'static str {
        "loan-create"
    }

    fn create_subtask(&self) -> Box<dyn Subtask> {
        Box::new(LoanCreateSubtask)
    }
}

/// Borrows the publication from the library.
///
/// The loan response is an updated catalog entry. It replaces the stored
/// entry; a hold halts the pipeline, and a loan supplies the target of the
/// next path element from the entry's refreshed acquisitions.
#[derive(Debug)]
pub struct LoanCreateSubtask;

#[async_trait]
impl Subtask for LoanCreateSubtask {
    #[instrument(skip_all, fields(book_id = %ctx.book_id()))]
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError> {
        ctx.publish_status(BookStatus::RequestingLoan);
        ctx.recorder().begin_new_step("Requesting loan");
        let target = require_target(ctx)?;

        let request = HttpRequest::get(target.clone())
            .with_auth(ctx.http_auth())
            .with_header("Accept", mime::OPDS_PUBLICATION);
        let response = ctx
            .services()
            .http
            .execute(request)
            .await
            .map_err(|e| http_failure("Loan request failed", e))?;

        let loaned = CatalogEntry::from_json(&response.body).map_err(|e| {
            SubtaskError::failed_with(
                format!("Could not parse the loan response from {target}"),
                ErrorCode::ResponseParseFailed,
                e,
            )
        })?;
        ctx.entry()
            .write_catalog_entry(&loaned)
            .await
            .map_err(|e| database_failure("Could not store the loan", e))?;

        match &loaned.availability {
            Availability::Reserved { position } => {
                info!(?position, "hold placed instead of loan");
                ctx.recorder().current_step_succeeded("A hold was placed");
                ctx.publish_status(BookStatus::Held {
                    position: *position,
                });
                return Err(SubtaskError::Halted);
            }
            Availability::Unavailable => {
                return Err(SubtaskError::failed(
                    "The library has no copy available to lend or hold",
                    ErrorCode::LoanUnavailable,
                ));
            }
            _ => {}
        }

        let wanted = ctx
            .peek_next_element()
            .map(|next| next.content_type.full_type());
        if let Some(wanted) = wanted {
            let offer = loaned
                .acquisitions
                .iter()
                .find(|offer| offer.content_type.is(&wanted));
            let Some(offer) = offer else {
                return Err(SubtaskError::failed(
                    format!("The loan offers no acquisition of type {wanted}"),
                    ErrorCode::MissingTargetAddress,
                ));
            };
            ctx.set_next_target(offer.target.clone());
        }

        ctx.recorder().current_step_succeeded("Loan created");
        Ok(())
    }
}

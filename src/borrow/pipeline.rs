//! The borrow pipeline: identify, persist, select a path, walk it.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::context::BorrowContext;
use super::registry::SubtaskQuery;
use super::services::BorrowServices;
use super::subtask::SubtaskError;
use crate::account::{AccountId, ProfileId};
use crate::acquisition::pick_best;
use crate::book::{Book, BookStatus};
use crate::cancel::CancellationFlag;
use crate::catalog::CatalogEntry;
use crate::database::BookDatabaseEntry;
use crate::mime;
use crate::task::{ErrorCode, StepCause, TaskRecorder, TaskResult};

/// What to borrow and for whom.
#[derive(Debug, Clone)]
pub struct BorrowRequest {
    /// Profile owning the account.
    pub profile: ProfileId,
    /// Account to borrow with.
    pub account: AccountId,
    /// Catalog entry to borrow.
    pub entry: CatalogEntry,
}

/// How a successful borrow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowCompletion {
    /// Every path element was realized.
    Completed,
    /// A subtask deferred the rest of the flow (hold placed, sign-in needed).
    HaltedEarly,
    /// Cancellation was requested and observed.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Loan,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Halted,
    Cancelled,
    Failed,
}

/// State that must survive a panic inside the run.
struct Progress {
    book: Book,
    entry: Option<Arc<dyn BookDatabaseEntry>>,
    phase: Phase,
}

impl Progress {
    fn current_book(&self) -> Book {
        self.entry
            .as_ref()
            .map_or_else(|| self.book.clone(), |entry| entry.book())
    }
}

/// One borrow of one catalog entry. Executes once.
pub struct BorrowTask {
    services: Arc<BorrowServices>,
    request: BorrowRequest,
    cancel: CancellationFlag,
}

impl BorrowTask {
    /// Creates a task; nothing runs until [`execute`](Self::execute).
    #[must_use]
    pub fn new(services: Arc<BorrowServices>, request: BorrowRequest) -> Self {
        Self {
            services,
            request,
            cancel: CancellationFlag::new(),
        }
    }

    /// Requests cancellation; observed between elements and during downloads.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for cancelling from another task once `execute` has taken `self`.
    #[must_use]
    pub fn cancel_handle(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Runs the borrow to completion.
    ///
    /// Every status transition goes to the book registry. Failures are
    /// reported through the returned step log and a failed status; this
    /// method itself never fails and never panics.
    #[instrument(skip(self), fields(entry_id = %self.request.entry.id, account = %self.request.account))]
    pub async fn execute(self) -> TaskResult<BorrowCompletion> {
        let book = Book::synthesize(self.request.account.clone(), self.request.entry.clone());
        info!(book_id = %book.id, "borrow started");
        self.services
            .book_registry
            .update(&book, BookStatus::RequestingDownload);

        let mut recorder = TaskRecorder::new();
        let mut progress = Progress {
            book,
            entry: None,
            phase: Phase::Loan,
        };

        let caught = AssertUnwindSafe(self.run(&mut recorder, &mut progress))
            .catch_unwind()
            .await;
        let outcome = caught.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(panic = %message, "borrow pipeline panicked");
            if !recorder.current_step_is_failed() {
                recorder.current_step_failed(
                    format!("Unexpected failure: {message}"),
                    ErrorCode::Unexpected,
                    None,
                );
            }
            RunOutcome::Failed
        });

        let book = progress.current_book();
        let registry = &self.services.book_registry;
        match outcome {
            RunOutcome::Completed => {
                info!(book_id = %book.id, "borrow completed");
                registry.update(&book, BookStatus::from_book(&book));
                recorder.finish_success(BorrowCompletion::Completed)
            }
            RunOutcome::Halted => {
                info!(book_id = %book.id, "borrow halted early");
                recorder.finish_success(BorrowCompletion::HaltedEarly)
            }
            RunOutcome::Cancelled => {
                info!(book_id = %book.id, "borrow cancelled");
                recorder.finish_success(BorrowCompletion::Cancelled)
            }
            RunOutcome::Failed => {
                let snapshot = recorder.finish_failure::<()>();
                warn!(
                    book_id = %book.id,
                    code = ?snapshot.error_code(),
                    phase = ?progress.phase,
                    "borrow failed"
                );
                let status = match progress.phase {
                    Phase::Loan => BookStatus::FailedLoan { result: snapshot },
                    Phase::Download => BookStatus::FailedDownload { result: snapshot },
                };
                registry.update(&book, status);
                recorder.finish_failure()
            }
        }
    }

    async fn run(&self, recorder: &mut TaskRecorder, progress: &mut Progress) -> RunOutcome {
        if self.cancel.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        let services = self.services.as_ref();

        recorder.begin_new_step("Identifying account");
        let Some(profile) = services.profiles.find_profile(&self.request.profile) else {
            recorder.current_step_failed(
                format!("Profile {} not found", self.request.profile),
                ErrorCode::ProfileNotFound,
                None,
            );
            return RunOutcome::Failed;
        };
        let Some(account) = profile.account(&self.request.account) else {
            recorder.current_step_failed(
                format!(
                    "Account {} not found in profile {}",
                    self.request.account, self.request.profile
                ),
                ErrorCode::AccountNotFound,
                None,
            );
            return RunOutcome::Failed;
        };
        recorder.current_step_succeeded(format!("Using account {}", account.id));

        recorder.begin_new_step("Creating database entry");
        let entry = match account
            .database
            .create_or_update(&progress.book.id, &account.id, &self.request.entry)
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                recorder.current_step_failed(
                    format!("Could not create the database entry: {e}"),
                    ErrorCode::DatabaseFailure,
                    Some(Arc::new(e)),
                );
                return RunOutcome::Failed;
            }
        };
        progress.entry = Some(Arc::clone(&entry));
        recorder.current_step_succeeded("Database entry ready");

        recorder.begin_new_step("Selecting acquisition path");
        let Some(path) = pick_best(&account.supported_content_types, &self.request.entry) else {
            recorder.current_step_failed(
                "None of the offered formats is supported",
                ErrorCode::NoSupportedAcquisition,
                None,
            );
            return RunOutcome::Failed;
        };
        recorder.current_step_succeeded(format!(
            "Selected a {} step path ending in {}",
            path.elements().len(),
            path.final_content_type()
        ));

        let mut ctx = BorrowContext::new(
            services,
            account,
            entry,
            path.elements().to_vec(),
            self.cancel.clone(),
            recorder,
        );
        walk_path(&mut ctx, progress).await
    }
}

async fn walk_path(ctx: &mut BorrowContext<'_>, progress: &mut Progress) -> RunOutcome {
    loop {
        if ctx.cancel_flag().is_cancelled() {
            return RunOutcome::Cancelled;
        }
        let Some(element) = ctx.advance() else {
            return RunOutcome::Completed;
        };
        let content_type = element.content_type.clone();
        progress.phase = if content_type.is(mime::OPDS_PUBLICATION) {
            Phase::Loan
        } else {
            Phase::Download
        };

        ctx.recorder()
            .begin_new_step(format!("Finding subtask for {content_type}"));
        let factory = ctx.services().subtasks.find_subtask_for(&SubtaskQuery {
            content_type: &content_type,
            target: ctx.current_target(),
            account: ctx.account(),
        });
        let Some(factory) = factory else {
            ctx.recorder().current_step_failed(
                format!("No subtask can handle {content_type}"),
                ErrorCode::NoSubtaskAvailable,
                None,
            );
            return RunOutcome::Failed;
        };
        ctx.recorder()
            .current_step_succeeded(format!("Using subtask '{}'", factory.name()));
        debug!(subtask = factory.name(), %content_type, "running subtask");

        let mut subtask = factory.create_subtask();
        let result = AssertUnwindSafe(subtask.execute(ctx)).catch_unwind().await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(SubtaskError::Halted)) => return RunOutcome::Halted,
            Ok(Err(SubtaskError::Cancelled)) => return RunOutcome::Cancelled,
            Ok(Err(SubtaskError::Failed {
                message,
                code,
                source,
            })) => {
                if !ctx.recorder().current_step_is_failed() {
                    let cause = source.map(StepCause::from);
                    ctx.recorder().current_step_failed(message, code, cause);
                }
                return RunOutcome::Failed;
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(subtask = factory.name(), panic = %message, "subtask panicked");
                if !ctx.recorder().current_step_is_failed() {
                    ctx.recorder().current_step_failed(
                        format!("Subtask '{}' failed unexpectedly: {message}", factory.name()),
                        ErrorCode::SubtaskUnexpectedFailure,
                        None,
                    );
                }
                return RunOutcome::Failed;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl std::fmt::Debug for BorrowTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorrowTask")
            .field("request", &self.request)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(text.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(owned.as_ref()), "bang");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}

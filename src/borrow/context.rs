//! Mutable state of one running borrow, handed to each subtask in turn.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;

use super::services::BorrowServices;
use super::subtask::SubtaskError;
use crate::account::{Account, AccountCredentials};
use crate::acquisition::PathElement;
use crate::book::{BookId, BookStatus};
use crate::cancel::CancellationFlag;
use crate::database::BookDatabaseEntry;
use crate::http::HttpAuth;
use crate::task::TaskRecorder;

#[derive(Clone)]
struct BearerToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// The state a subtask reads and writes while realizing its element.
///
/// The pipeline advances through the path; a subtask may look at or consume
/// the element after its own and supply that element's target address.
pub struct BorrowContext<'a> {
    services: &'a BorrowServices,
    account: Arc<Account>,
    book_id: BookId,
    entry: Arc<dyn BookDatabaseEntry>,
    current: Option<PathElement>,
    current_target: Option<Url>,
    remaining: VecDeque<PathElement>,
    next_target: Option<Url>,
    bearer_token: Option<BearerToken>,
    cancel: CancellationFlag,
    recorder: &'a mut TaskRecorder,
}

impl<'a> BorrowContext<'a> {
    pub(crate) fn new(
        services: &'a BorrowServices,
        account: Arc<Account>,
        entry: Arc<dyn BookDatabaseEntry>,
        path: Vec<PathElement>,
        cancel: CancellationFlag,
        recorder: &'a mut TaskRecorder,
    ) -> Self {
        let book_id = entry.book().id;
        Self {
            services,
            account,
            book_id,
            entry,
            current: None,
            current_target: None,
            remaining: path.into(),
            next_target: None,
            bearer_token: None,
            cancel,
            recorder,
        }
    }

    /// Moves to the next path element. Returns `None` at the end of the path.
    pub(crate) fn advance(&mut self) -> Option<&PathElement> {
        let element = self.remaining.pop_front()?;
        let carried = self.next_target.take();
        self.current_target = element.target.clone().or(carried);
        self.current = Some(element);
        self.current.as_ref()
    }

    /// Shared services.
    #[must_use]
    pub fn services(&self) -> &'a BorrowServices {
        self.services
    }

    /// Account the borrow runs for.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Identifier of the book being borrowed.
    #[must_use]
    pub fn book_id(&self) -> &BookId {
        &self.book_id
    }

    /// Database entry of the book being borrowed.
    #[must_use]
    pub fn entry(&self) -> &Arc<dyn BookDatabaseEntry> {
        &self.entry
    }

    /// Element being realized.
    #[must_use]
    pub fn current_element(&self) -> Option<&PathElement> {
        self.current.as_ref()
    }

    /// Address of the current element: its own target, or the one the
    /// previous subtask supplied.
    #[must_use]
    pub fn current_target(&self) -> Option<&Url> {
        self.current_target.as_ref()
    }

    /// Element after the current one.
    #[must_use]
    pub fn peek_next_element(&self) -> Option<&PathElement> {
        self.remaining.front()
    }

    /// Consumes the element after the current one so the pipeline skips it.
    pub fn take_next_element(&mut self) -> Option<PathElement> {
        self.remaining.pop_front()
    }

    /// Supplies the target address of the next element.
    pub fn set_next_target(&mut self, target: Url) {
        debug!(target = %target, "next element target set");
        self.next_target = Some(target);
    }

    /// Stores a bearer token that authorizes requests until `expires_at`.
    pub fn set_bearer_token(&mut self, token: String, expires_at: DateTime<Utc>) {
        self.bearer_token = Some(BearerToken { token, expires_at });
    }

    /// Bearer token obtained during this borrow, unless it has expired.
    #[must_use]
    pub fn active_bearer_token(&self) -> Option<&str> {
        let now = self.services.clock.now();
        self.bearer_token
            .as_ref()
            .filter(|bearer| bearer.expires_at > now)
            .map(|bearer| bearer.token.as_str())
    }

    /// Authorization for the next request.
    ///
    /// An unexpired bearer token obtained during this borrow takes
    /// precedence over the account's own credentials.
    #[must_use]
    pub fn http_auth(&self) -> Option<HttpAuth> {
        if let Some(token) = self.active_bearer_token() {
            return Some(HttpAuth::Bearer {
                token: token.to_string(),
            });
        }
        self.account
            .credentials
            .as_ref()
            .map(AccountCredentials::http_auth)
    }

    /// Publishes a status transition for the book as currently stored.
    pub fn publish_status(&self, status: BookStatus) {
        self.services
            .book_registry
            .update(&self.entry.book(), status);
    }

    /// Cancellation flag of the borrow.
    #[must_use]
    pub fn cancel_flag(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Fails with [`SubtaskError::Cancelled`] once cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`SubtaskError::Cancelled`] when the flag is set.
    pub fn check_cancelled(&self) -> Result<(), SubtaskError> {
        if self.cancel.is_cancelled() {
            Err(SubtaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Step log of the borrow.
    pub fn recorder(&mut self) -> &mut TaskRecorder {
        self.recorder
    }
}

impl std::fmt::Debug for BorrowContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorrowContext")
            .field("book_id", &self.book_id)
            .field("account", &self.account.id)
            .field("current", &self.current)
            .field("current_target", &self.current_target.as_ref().map(Url::as_str))
            .field("remaining", &self.remaining.len())
            .finish_non_exhaustive()
    }
}

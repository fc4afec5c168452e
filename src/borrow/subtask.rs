//! The unit of work that realizes one acquisition path element.

use std::error::Error as StdError;

use async_trait::async_trait;
use thiserror::Error;

use super::context::BorrowContext;
use crate::task::ErrorCode;

/// Dispatch priority; lower values are consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubtaskPriority {
    /// Matches narrow conditions (a URL scheme, an account capability).
    Specialized = 0,
    /// Matches a content type.
    General = 1,
    /// Catch-all for plain downloads.
    Fallback = 2,
}

/// How a subtask stopped short of success.
#[derive(Debug, Error)]
pub enum SubtaskError {
    /// Ordinary failure; ends the pipeline as failed.
    #[error("{message}")]
    Failed {
        /// What went wrong.
        message: String,
        /// Classification recorded on the step.
        code: ErrorCode,
        /// Underlying error, if any.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Stop the pipeline early without failing it.
    ///
    /// Used when the rest of the flow is deferred, e.g. until the user signs
    /// in through a browser or a hold becomes available.
    #[error("pipeline halted early")]
    Halted,

    /// The cancellation flag was observed.
    #[error("pipeline was cancelled")]
    Cancelled,
}

impl SubtaskError {
    /// Creates a failure without an underlying error.
    pub fn failed(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Failed {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Creates a failure caused by `source`.
    pub fn failed_with(
        message: impl Into<String>,
        code: ErrorCode,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            code,
            source: Some(Box::new(source)),
        }
    }
}

/// One run of a subtask against one path element.
#[async_trait]
pub trait Subtask: Send {
    /// Realizes the current path element of `ctx`.
    ///
    /// A subtask may record steps, publish status transitions, write to the
    /// database entry, set the next element's target, consume the next
    /// element, and poll the cancellation flag.
    ///
    /// # Errors
    ///
    /// Returns [`SubtaskError`] to fail, halt, or report cancellation.
    async fn execute(&mut self, ctx: &mut BorrowContext<'_>) -> Result<(), SubtaskError>;
}

/// Creates fresh subtasks; registered in the subtask registry.
pub trait SubtaskFactory: Send + Sync {
    /// Display name for logs and step messages.
    fn name(&self) -> &'static str;

    /// Creates a subtask for one element.
    fn create_subtask(&self) -> Box<dyn Subtask>;
}

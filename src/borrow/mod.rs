//! Borrow execution.
//!
//! A [`BorrowTask`] identifies the account, creates the database entry,
//! picks an acquisition path and walks it element by element. Each element
//! is handled by a [`Subtask`] looked up in the [`SubtaskRegistry`]; a
//! subtask may fetch, fulfill, or download, and may hand a target address
//! to the element after it.

mod context;
mod pipeline;
mod registry;
mod services;
mod subtask;
pub mod subtasks;

pub use context::BorrowContext;
pub use pipeline::{BorrowCompletion, BorrowRequest, BorrowTask};
pub use registry::{SubtaskPredicate, SubtaskQuery, SubtaskRegistry};
pub use services::{BorrowServices, ServicesError};
pub use subtask::{Subtask, SubtaskError, SubtaskFactory, SubtaskPriority};
pub use subtasks::build_default_subtask_registry;

//! Append-only step log shared by the borrow and manifest pipelines.
//!
//! Every stage of a pipeline begins a step with a human-readable description
//! and resolves it as succeeded or failed. The final [`TaskResult`] is an
//! immutable snapshot of those steps plus a verdict; it is the only thing a
//! caller sees of a run.

mod error_code;

pub use error_code::ErrorCode;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Shareable underlying cause of a failed step.
pub type StepCause = Arc<dyn StdError + Send + Sync>;

/// How a step ended.
#[derive(Clone)]
pub enum TaskStepResolution {
    /// The step succeeded.
    Succeeded {
        /// Outcome description (may be empty).
        message: String,
    },
    /// The step failed.
    Failed {
        /// What went wrong.
        message: String,
        /// Classification of the failure.
        code: ErrorCode,
        /// Underlying error, when there is one.
        cause: Option<StepCause>,
    },
}

impl fmt::Debug for TaskStepResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { message } => f
                .debug_struct("Succeeded")
                .field("message", message)
                .finish(),
            Self::Failed {
                message,
                code,
                cause,
            } => f
                .debug_struct("Failed")
                .field("message", message)
                .field("code", code)
                .field("cause", &cause.as_ref().map(ToString::to_string))
                .finish(),
        }
    }
}

/// One entry of the step log.
///
/// A step counts as succeeded until it is explicitly marked failed.
#[derive(Debug, Clone)]
pub struct TaskStep {
    /// What the step does.
    pub description: String,
    /// How it ended.
    pub resolution: TaskStepResolution,
}

impl TaskStep {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            resolution: TaskStepResolution::Succeeded {
                message: String::new(),
            },
        }
    }

    /// Returns true if the step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.resolution, TaskStepResolution::Failed { .. })
    }

    /// Returns the error code of a failed step.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.resolution {
            TaskStepResolution::Failed { code, .. } => Some(*code),
            TaskStepResolution::Succeeded { .. } => None,
        }
    }

    /// Returns the resolution message.
    #[must_use]
    pub fn message(&self) -> &str {
        match &self.resolution {
            TaskStepResolution::Succeeded { message } | TaskStepResolution::Failed { message, .. } => {
                message
            }
        }
    }
}

/// Terminal snapshot of a pipeline run.
#[derive(Debug, Clone)]
pub enum TaskResult<T> {
    /// The run succeeded and produced `value`.
    Success {
        /// All recorded steps.
        steps: Vec<TaskStep>,
        /// Product of the run.
        value: T,
    },
    /// The run failed; the last failed step explains why.
    Failure {
        /// All recorded steps.
        steps: Vec<TaskStep>,
    },
}

impl<T> TaskResult<T> {
    /// All recorded steps in order.
    #[must_use]
    pub fn steps(&self) -> &[TaskStep] {
        match self {
            Self::Success { steps, .. } | Self::Failure { steps } => steps,
        }
    }

    /// Returns true for a successful run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the value of a successful run.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the last failed step, if any.
    #[must_use]
    pub fn last_failed_step(&self) -> Option<&TaskStep> {
        self.steps().iter().rev().find(|step| step.is_failed())
    }

    /// Returns the error code of the last failed step.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.last_failed_step().and_then(TaskStep::error_code)
    }

    /// Maps the success value, keeping the steps.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskResult<U> {
        match self {
            Self::Success { steps, value } => TaskResult::Success {
                steps,
                value: f(value),
            },
            Self::Failure { steps } => TaskResult::Failure { steps },
        }
    }
}

/// Mutable step log used while a pipeline runs.
#[derive(Debug, Default)]
pub struct TaskRecorder {
    steps: Vec<TaskStep>,
}

impl TaskRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new step; later resolutions apply to it.
    pub fn begin_new_step(&mut self, description: impl Into<String>) -> &TaskStep {
        let step = TaskStep::new(description);
        tracing::debug!(step = %step.description, "task step started");
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    /// Marks the current step succeeded with `message`.
    pub fn current_step_succeeded(&mut self, message: impl Into<String>) {
        self.current_step_mut().resolution = TaskStepResolution::Succeeded {
            message: message.into(),
        };
    }

    /// Marks the current step failed.
    pub fn current_step_failed(
        &mut self,
        message: impl Into<String>,
        code: ErrorCode,
        cause: Option<StepCause>,
    ) {
        let message = message.into();
        tracing::debug!(code = %code, message = %message, "task step failed");
        self.current_step_mut().resolution = TaskStepResolution::Failed {
            message,
            code,
            cause,
        };
    }

    /// Returns the most recently started step.
    #[must_use]
    pub fn current_step(&self) -> Option<&TaskStep> {
        self.steps.last()
    }

    /// Returns true if the most recent step is marked failed.
    #[must_use]
    pub fn current_step_is_failed(&self) -> bool {
        self.current_step().is_some_and(TaskStep::is_failed)
    }

    /// Appends steps recorded by a nested pipeline.
    pub fn add_all(&mut self, steps: &[TaskStep]) {
        self.steps.extend_from_slice(steps);
    }

    /// Steps recorded so far.
    #[must_use]
    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    /// Snapshots the log as a successful result.
    #[must_use]
    pub fn finish_success<T>(&self, value: T) -> TaskResult<T> {
        TaskResult::Success {
            steps: self.steps.clone(),
            value,
        }
    }

    /// Snapshots the log as a failed result.
    #[must_use]
    pub fn finish_failure<T>(&self) -> TaskResult<T> {
        TaskResult::Failure {
            steps: self.steps.clone(),
        }
    }

    fn current_step_mut(&mut self) -> &mut TaskStep {
        if self.steps.is_empty() {
            self.steps.push(TaskStep::new("Unlabelled step"));
        }
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }
}

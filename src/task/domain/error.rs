//! Error types for task domain validation, parsing and transitions.

use super::{TaskId, TaskStatus};
use crate::builder::domain::BuilderId;
use crate::matrix::domain::MatrixDomainError;
use thiserror::Error;

/// Errors returned while constructing or transitioning task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The requested platform or tags are invalid.
    #[error(transparent)]
    Requirements(#[from] MatrixDomainError),

    /// The branch name is empty, contains whitespace, or is too long.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// The commit identifier is not a 40 or 64 character hex digest.
    #[error("invalid commit identifier '{0}'")]
    InvalidCommitId(String),

    /// The artifact format is empty or contains unsupported characters.
    #[error("invalid artifact format '{0}'")]
    InvalidArtifactFormat(String),

    /// The requested status change is not allowed.
    #[error("invalid state transition for task {task_id}: {from} -> {to}")]
    InvalidStateTransition {
        /// Task being transitioned.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// The reporting builder is not the one holding the task.
    #[error("task {task_id} is not held by builder {builder_id}")]
    BuilderMismatch {
        /// Task named in the report.
        task_id: TaskId,
        /// Builder that sent the report.
        builder_id: BuilderId,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

//! Error types for builder domain validation and parsing.

use super::BuilderId;
use crate::task::domain::TaskId;
use thiserror::Error;

/// Errors returned while constructing or mutating builder domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuilderDomainError {
    /// The builder name is empty after trimming.
    #[error("builder name must not be empty")]
    EmptyBuilderName,

    /// The builder name contains characters outside `[A-Za-z0-9._-]`.
    #[error(
        "builder name '{0}' contains invalid characters (only alphanumerics, '.', '_' and '-' allowed)"
    )]
    InvalidBuilderName(String),

    /// The builder name exceeds the 100-character storage limit.
    #[error("builder name exceeds 100 character limit: {0}")]
    BuilderNameTooLong(String),

    /// The builder already holds a task and cannot take another.
    #[error("builder {builder_id} is busy with task {task_id}")]
    BuilderBusy {
        /// Builder that was asked to take work.
        builder_id: BuilderId,
        /// Task the builder currently holds.
        task_id: TaskId,
    },

    /// The builder is not idle even though it holds no task.
    #[error("builder {0} reported itself busy")]
    BuilderNotIdle(BuilderId),

    /// The task named in a release is not the builder's current task.
    #[error("task {task_id} is not assigned to builder {builder_id}")]
    TaskNotAssigned {
        /// Builder being released.
        builder_id: BuilderId,
        /// Task named by the release.
        task_id: TaskId,
    },
}

/// Error returned while parsing trust levels from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown trust level: {0}")]
pub struct ParseTrustLevelError(pub String);

//! Repository port for task persistence and lookup.

use crate::task::domain::{Task, TaskId, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Outcome of [`TaskRepository::store_or_reuse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInsertion {
    /// The new task was stored.
    Stored,
    /// An equivalent live task already existed and was kept instead.
    Reused(Task),
}

/// Task persistence contract.
///
/// Assignment and release writes that also touch builder records go through
/// [`crate::dispatch::ports::DispatchStore`].
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Stores `task` unless a task with identical requirements and commit
    /// exists whose status is neither `failed` nor `archived`.
    ///
    /// The lookup and the insert happen in one transaction; when several
    /// equivalent tasks exist the oldest one is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store_or_reuse(&self, task: &Task) -> TaskRepositoryResult<TaskInsertion>;

    /// Writes the status and timestamps of `task` if the stored status still
    /// equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist
    /// or [`TaskRepositoryError::StatusConflict`] when another writer changed
    /// the status first.
    async fn update_status(&self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    async fn find_task(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns every pending task, oldest first with ties broken by
    /// ascending identifier.
    async fn list_pending(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Returns one page of tasks, newest first.
    async fn list_recent(&self, offset: usize, limit: usize) -> TaskRepositoryResult<Vec<Task>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The stored status differs from the one the caller read.
    #[error("task {task_id} status changed concurrently: expected {expected}, found {found}")]
    StatusConflict {
        /// Task being written.
        task_id: TaskId,
        /// Status the caller based its change on.
        expected: TaskStatus,
        /// Status currently stored.
        found: TaskStatus,
    },

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

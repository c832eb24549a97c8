//! Store port for writes spanning builder and task records.

use crate::builder::domain::{Builder, BuilderId};
use crate::dispatch::domain::{AssignmentConflict, DispatchRejection};
use crate::task::domain::{BuildOutcome, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for dispatch store operations.
pub type DispatchStoreResult<T> = Result<T, DispatchStoreError>;

/// Builder state after a heartbeat was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRecord {
    /// The builder as stored after the heartbeat.
    pub builder: Builder,
    /// The task handed over by this heartbeat, if it was the delivering one.
    pub delivered: Option<Task>,
}

/// Result of a builder-driven task transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was written.
    Applied(Task),
    /// The task was already in the reported state.
    AlreadyApplied(Task),
}

impl TransitionOutcome {
    /// Returns the task as stored.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Applied(task) | Self::AlreadyApplied(task) => task,
        }
    }
}

/// Atomic dispatch writes.
///
/// Each method reads the builder and task it touches, applies the rules in
/// [`crate::dispatch::domain`], and writes both records in one transaction
/// or neither.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Returns one builder among `candidates` that holds no task, is idle,
    /// and sent a heartbeat at or after `live_since`.
    ///
    /// The oldest registration wins when several qualify.
    async fn find_idle_builder(
        &self,
        candidates: &[BuilderId],
        live_since: DateTime<Utc>,
    ) -> DispatchStoreResult<Option<BuilderId>>;

    /// Assigns a pending task to an available builder.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchStoreError::Rejected`] wrapping an
    /// [`AssignmentConflict`] when either record changed since it was
    /// chosen, or a not-found error for missing records.
    async fn assign(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        live_since: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<Task>;

    /// Records a heartbeat and, when the builder reports idle while holding
    /// an undelivered task, marks that task delivered.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchStoreError::BuilderNotFound`] for unknown builders.
    async fn record_heartbeat(
        &self,
        builder_id: BuilderId,
        reported_idle: bool,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<HeartbeatRecord>;

    /// Moves a task the builder holds from `building` to `uploading`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchStoreError::Rejected`] when the report is not legal
    /// for the stored records.
    async fn begin_upload(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<TransitionOutcome>;

    /// Records the outcome of a task and frees its builder.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchStoreError::Rejected`] when the report is not legal
    /// for the stored records.
    async fn release(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        outcome: BuildOutcome,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<TransitionOutcome>;
}

/// Errors returned by dispatch store implementations.
#[derive(Debug, Clone, Error)]
pub enum DispatchStoreError {
    /// The stored records do not allow the write.
    #[error(transparent)]
    Rejected(#[from] DispatchRejection),

    /// The builder was not found.
    #[error("builder not found: {0}")]
    BuilderNotFound(BuilderId),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl DispatchStoreError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns the assignment conflict, if this error is one.
    #[must_use]
    pub const fn as_conflict(&self) -> Option<&AssignmentConflict> {
        match self {
            Self::Rejected(DispatchRejection::Conflict(conflict)) => Some(conflict),
            _ => None,
        }
    }
}

//! Rules for writes that change a builder and a task together.
//!
//! Store adapters load both records inside one transaction, apply one of
//! these functions, and persist both records only when it succeeds. Keeping
//! the rules here means every adapter agrees on what counts as a conflict,
//! a rejected report or a duplicate.

use crate::builder::domain::{Builder, BuilderDomainError, BuilderId};
use crate::task::domain::{BuildOutcome, Task, TaskDomainError, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a conditional assignment did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignmentConflict {
    /// The builder is busy, self-reported busy, or stale.
    #[error("builder {0} is no longer available")]
    BuilderUnavailable(BuilderId),

    /// The task left `pending` since it was read.
    #[error("task {task_id} is {status}, not pending")]
    TaskNotPending {
        /// Task that was to be assigned.
        task_id: TaskId,
        /// Its current status.
        status: TaskStatus,
    },
}

/// A dispatch write that the current records do not allow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchRejection {
    /// A scheduler assignment lost a race.
    #[error("assignment conflict: {0}")]
    Conflict(#[from] AssignmentConflict),

    /// A report asked for a transition the state machine forbids.
    #[error("transition rejected for task {task_id}: {from} -> {to}")]
    TransitionRejected {
        /// Task named in the report.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// A report came from a builder that does not hold the task.
    #[error("task {task_id} is not held by builder {builder_id}")]
    NotHeldBy {
        /// Task named in the report.
        task_id: TaskId,
        /// Builder that sent the report.
        builder_id: BuilderId,
    },
}

/// Whether a transition changed the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Both records were modified and must be written.
    Applied,
    /// The records already reflect the report; nothing to write.
    Unchanged,
}

/// Hands a pending `task` to an available `builder`.
///
/// # Errors
///
/// Returns [`AssignmentConflict::TaskNotPending`] when the task is no longer
/// pending and [`AssignmentConflict::BuilderUnavailable`] when the builder
/// holds a task, is not idle, or has not been heard from since
/// `live_since`.
pub fn apply_assignment(
    task: &mut Task,
    builder: &mut Builder,
    live_since: DateTime<Utc>,
    at: DateTime<Utc>,
) -> Result<(), DispatchRejection> {
    if task.status() != TaskStatus::Pending {
        return Err(AssignmentConflict::TaskNotPending {
            task_id: task.id(),
            status: task.status(),
        }
        .into());
    }
    if !builder.is_available(live_since) {
        return Err(AssignmentConflict::BuilderUnavailable(builder.id()).into());
    }

    builder
        .claim(task.id(), at)
        .map_err(|err| builder_rejection(err, builder.id()))?;
    task.assign(builder.id(), at)
        .map_err(|err| task_rejection(err, task, TaskStatus::Building))?;
    Ok(())
}

/// Moves a building `task` to `uploading` on behalf of `builder`.
///
/// Repeating the report while already uploading is a no-op.
///
/// # Errors
///
/// Returns [`DispatchRejection::TransitionRejected`] from any other status
/// and [`DispatchRejection::NotHeldBy`] when `builder` does not hold the
/// task.
pub fn apply_upload(
    task: &mut Task,
    builder: &Builder,
    at: DateTime<Utc>,
) -> Result<TransitionEffect, DispatchRejection> {
    if task.status() == TaskStatus::Uploading && task.assigned_builder() == Some(builder.id()) {
        return Ok(TransitionEffect::Unchanged);
    }
    task.begin_upload(builder.id(), at)
        .map_err(|err| task_rejection(err, task, TaskStatus::Uploading))?;
    Ok(TransitionEffect::Applied)
}

/// Records `outcome` for `task` and frees `builder`.
///
/// A task that already ended with the same outcome under the same builder
/// is left as is, which makes repeated terminal reports harmless.
///
/// # Errors
///
/// Returns [`DispatchRejection::TransitionRejected`] unless the task is
/// building or uploading, and [`DispatchRejection::NotHeldBy`] when
/// `builder` does not hold it.
pub fn apply_release(
    task: &mut Task,
    builder: &mut Builder,
    outcome: BuildOutcome,
    at: DateTime<Utc>,
) -> Result<TransitionEffect, DispatchRejection> {
    let target = outcome.status();
    if task.status() == target && task.last_builder() == Some(builder.id()) {
        return Ok(TransitionEffect::Unchanged);
    }

    task.finish(builder.id(), outcome, at)
        .map_err(|err| task_rejection(err, task, target))?;
    builder
        .release(task.id(), at)
        .map_err(|err| builder_rejection(err, builder.id()))?;
    Ok(TransitionEffect::Applied)
}

fn task_rejection(err: TaskDomainError, task: &Task, target: TaskStatus) -> DispatchRejection {
    match err {
        TaskDomainError::BuilderMismatch {
            task_id,
            builder_id,
        } => DispatchRejection::NotHeldBy {
            task_id,
            builder_id,
        },
        TaskDomainError::InvalidStateTransition { task_id, from, to } => {
            DispatchRejection::TransitionRejected { task_id, from, to }
        }
        _ => DispatchRejection::TransitionRejected {
            task_id: task.id(),
            from: task.status(),
            to: target,
        },
    }
}

fn builder_rejection(err: BuilderDomainError, builder_id: BuilderId) -> DispatchRejection {
    match err {
        BuilderDomainError::TaskNotAssigned {
            builder_id: id,
            task_id,
        } => DispatchRejection::NotHeldBy {
            task_id,
            builder_id: id,
        },
        _ => AssignmentConflict::BuilderUnavailable(builder_id).into(),
    }
}

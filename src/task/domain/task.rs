//! Task aggregate root.

use super::{
    ArtifactFormat, BuildOutcome, CommitId, PosterId, TaskDomainError, TaskId, TaskRequirements,
    TaskStatus,
};
use crate::builder::domain::BuilderId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Build task aggregate root.
///
/// `assigned_builder` is set exactly while the status is `building` or
/// `uploading`. `last_builder` keeps the most recent builder after release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    requirements: TaskRequirements,
    commit: CommitId,
    status: TaskStatus,
    poster: PosterId,
    assigned_builder: Option<BuilderId>,
    last_builder: Option<BuilderId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted platform and tag requirements.
    pub requirements: TaskRequirements,
    /// Persisted resolved commit.
    pub commit: CommitId,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted poster identity.
    pub poster: PosterId,
    /// Builder currently holding the task, if any.
    pub assigned_builder: Option<BuilderId>,
    /// Most recent builder to hold the task, if any.
    pub last_builder: Option<BuilderId>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new pending task.
    #[must_use]
    pub fn new(
        poster: PosterId,
        requirements: TaskRequirements,
        commit: CommitId,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            requirements,
            commit,
            status: TaskStatus::Pending,
            poster,
            assigned_builder: None,
            last_builder: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            requirements: data.requirements,
            commit: data.commit,
            status: data.status,
            poster: data.poster,
            assigned_builder: data.assigned_builder,
            last_builder: data.last_builder,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the platform and tag requirements.
    #[must_use]
    pub const fn requirements(&self) -> &TaskRequirements {
        &self.requirements
    }

    /// Returns the resolved commit.
    #[must_use]
    pub const fn commit(&self) -> &CommitId {
        &self.commit
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns who requested the task.
    #[must_use]
    pub const fn poster(&self) -> PosterId {
        self.poster
    }

    /// Returns the builder currently holding the task.
    #[must_use]
    pub const fn assigned_builder(&self) -> Option<BuilderId> {
        self.assigned_builder
    }

    /// Returns the most recent builder to hold the task.
    #[must_use]
    pub const fn last_builder(&self) -> Option<BuilderId> {
        self.last_builder
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether `target` is reachable from the current status.
    #[must_use]
    pub const fn can_transition_to(&self, target: TaskStatus) -> bool {
        self.status.can_transition_to(target)
    }

    /// Returns whether the task can never be assigned again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Hands the task to `builder_id`, moving it to `building`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// pending.
    pub fn assign(&mut self, builder_id: BuilderId, at: DateTime<Utc>) -> Result<(), TaskDomainError> {
        self.transition_to(TaskStatus::Building, at)?;
        self.assigned_builder = Some(builder_id);
        self.last_builder = Some(builder_id);
        Ok(())
    }

    /// Records that `builder_id` started uploading artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// building, or [`TaskDomainError::BuilderMismatch`] when another builder
    /// holds it.
    pub fn begin_upload(
        &mut self,
        builder_id: BuilderId,
        at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_transition(TaskStatus::Uploading)?;
        self.ensure_held_by(builder_id)?;
        self.transition_to(TaskStatus::Uploading, at)
    }

    /// Records the final outcome reported by `builder_id` and releases it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// building or uploading, or [`TaskDomainError::BuilderMismatch`] when
    /// another builder holds it.
    pub fn finish(
        &mut self,
        builder_id: BuilderId,
        outcome: BuildOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        self.ensure_transition(outcome.status())?;
        self.ensure_held_by(builder_id)?;
        self.transition_to(outcome.status(), at)?;
        self.assigned_builder = None;
        Ok(())
    }

    /// Retires a finished task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the task is
    /// failed or succeeded.
    pub fn archive(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition_to(TaskStatus::Archived, clock.utc())
    }

    /// Returns the artifact file name for `format`.
    ///
    /// The name is `{pack_root}_{short commit}_{os}_{arch}` followed by one
    /// `_{tag}` per tag in sorted order and `.{format}`.
    #[must_use]
    pub fn artifact_name(&self, pack_root: &str, format: &ArtifactFormat) -> String {
        let platform = self.requirements.platform();
        let mut name = format!(
            "{pack_root}_{}_{}_{}",
            self.commit.short(),
            platform.os(),
            platform.arch()
        );
        for tag in self.requirements.tags().iter() {
            name.push('_');
            name.push_str(tag);
        }
        name.push('.');
        name.push_str(format.as_str());
        name
    }

    fn ensure_transition(&self, target: TaskStatus) -> Result<(), TaskDomainError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(TaskDomainError::InvalidStateTransition {
                task_id: self.id,
                from: self.status,
                to: target,
            })
        }
    }

    fn ensure_held_by(&self, builder_id: BuilderId) -> Result<(), TaskDomainError> {
        if self.assigned_builder == Some(builder_id) {
            Ok(())
        } else {
            Err(TaskDomainError::BuilderMismatch {
                task_id: self.id,
                builder_id,
            })
        }
    }

    fn transition_to(&mut self, target: TaskStatus, at: DateTime<Utc>) -> Result<(), TaskDomainError> {
        self.ensure_transition(target)?;
        self.status = target;
        self.updated_at = at;
        Ok(())
    }
}

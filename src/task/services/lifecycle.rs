//! Service layer for task creation, lookup and archiving.
//!
//! Status changes driven by builders and the scheduler go through
//! [`crate::dispatch`]; this service owns the operator-facing side of the
//! lifecycle.

use crate::config::{BatchTarget, ConfigError, CoordinatorConfig, ProjectConfig};
use crate::matrix::{
    ports::CapabilityRepository,
    services::{CapabilityRegistryError, MatchEngine},
};
use crate::task::{
    domain::{
        ArtifactFormat, BranchName, CommitId, PosterId, Task, TaskDomainError, TaskId,
        TaskRequirements,
    },
    ports::{
        ArtifactStore, CommitResolutionError, CommitResolver, TaskInsertion, TaskRepository,
        TaskRepositoryError,
    },
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Request payload for creating a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    poster: PosterId,
    os: String,
    arch: String,
    tags: Vec<String>,
    branch: String,
}

impl CreateTaskRequest {
    /// Creates a request with no tag requirements.
    #[must_use]
    pub fn new(
        poster: PosterId,
        os: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            poster,
            os: os.into(),
            arch: arch.into(),
            tags: Vec::new(),
            branch: branch.into(),
        }
    }

    /// Sets the required tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Result of creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCreation {
    /// A new pending task was stored.
    Created(Task),
    /// An equivalent task that had not failed or been archived was reused.
    Reused(Task),
}

impl TaskCreation {
    /// Returns the created or reused task.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Created(task) | Self::Reused(task) => task,
        }
    }

    /// Consumes the outcome and returns the task.
    #[must_use]
    pub fn into_task(self) -> Task {
        match self {
            Self::Created(task) | Self::Reused(task) => task,
        }
    }

    /// Returns whether an existing task was reused.
    #[must_use]
    pub const fn is_reused(&self) -> bool {
        matches!(self, Self::Reused(_))
    }
}

/// A batch target that could not be turned into a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRejection {
    /// The configured target.
    pub target: BatchTarget,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of batch task creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Newly created tasks.
    pub created: Vec<Task>,
    /// Existing tasks reused instead of creating duplicates.
    pub reused: Vec<Task>,
    /// Targets no builder can serve or that failed validation.
    pub rejected: Vec<BatchRejection>,
}

/// An artifact that could not be removed while archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCleanupFailure {
    /// Format whose file remained.
    pub format: ArtifactFormat,
    /// Storage error message.
    pub reason: String,
}

/// Result of archiving a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// The archived task.
    pub task: Task,
    /// Formats whose artifact could not be deleted.
    pub cleanup_failures: Vec<ArtifactCleanupFailure>,
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation or transition failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// Capability lookup failed or no builder can serve the task.
    #[error(transparent)]
    Capability(#[from] CapabilityRegistryError),
    /// The branch could not be resolved to a commit.
    #[error(transparent)]
    CommitResolution(#[from] CommitResolutionError),
    /// Project configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

impl TaskLifecycleError {
    /// Returns whether the task was rejected because no builder can serve
    /// it.
    #[must_use]
    pub const fn is_no_suitable_capability(&self) -> bool {
        matches!(
            self,
            Self::Capability(CapabilityRegistryError::NoSuitableCapability { .. })
        )
    }
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task creation, lookup and archiving service.
pub struct TaskLifecycleService<S, G, A, C>
where
    S: TaskRepository + CapabilityRepository,
    G: CommitResolver,
    A: ArtifactStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    matcher: MatchEngine<S>,
    commits: Arc<G>,
    artifacts: Arc<A>,
    clock: Arc<C>,
    project: ProjectConfig,
    batch: Vec<BatchTarget>,
}

impl<S, G, A, C> TaskLifecycleService<S, G, A, C>
where
    S: TaskRepository + CapabilityRepository,
    G: CommitResolver,
    A: ArtifactStore,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        commits: Arc<G>,
        artifacts: Arc<A>,
        clock: Arc<C>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            matcher: MatchEngine::new(Arc::clone(&store)),
            store,
            commits,
            artifacts,
            clock,
            project: config.project.clone(),
            batch: config.batch.clone(),
        }
    }

    /// Creates a pending task, or reuses an equivalent one.
    ///
    /// Capability matching happens before the branch is resolved, so a task
    /// no builder can run is rejected without touching source control.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Capability`] wrapping
    /// [`CapabilityRegistryError::NoSuitableCapability`] when no builder can
    /// serve the requirements, [`TaskLifecycleError::CommitResolution`] when
    /// the branch cannot be resolved, and domain or repository errors
    /// otherwise.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskLifecycleResult<TaskCreation> {
        let CreateTaskRequest {
            poster,
            os,
            arch,
            tags,
            branch,
        } = request;
        let requirements = TaskRequirements::parse(os, arch, tags)?;
        let branch_name = BranchName::new(branch)?;

        self.ensure_servable(&requirements).await?;
        let commit = self.commits.resolve(&branch_name).await?;
        self.store_or_reuse(poster, requirements, commit).await
    }

    /// Creates one task per configured batch target for the head of
    /// `branch`.
    ///
    /// The branch is resolved once. Targets no builder can serve are
    /// reported as rejections rather than failing the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::CommitResolution`] when the branch cannot
    /// be resolved, or a repository error when storage fails.
    pub async fn create_batch(
        &self,
        poster: PosterId,
        branch: &str,
    ) -> TaskLifecycleResult<BatchReport> {
        let branch_name = BranchName::new(branch)?;
        let commit = self.commits.resolve(&branch_name).await?;
        let mut report = BatchReport::default();

        for target in &self.batch {
            let requirements = match target.requirements() {
                Ok(requirements) => requirements,
                Err(err) => {
                    report.rejected.push(BatchRejection {
                        target: target.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match self.ensure_servable(&requirements).await {
                Ok(()) => {}
                Err(err @ TaskLifecycleError::Capability(
                    CapabilityRegistryError::NoSuitableCapability { .. },
                )) => {
                    report.rejected.push(BatchRejection {
                        target: target.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            }

            match self
                .store_or_reuse(poster, requirements, commit.clone())
                .await?
            {
                TaskCreation::Created(task) => report.created.push(task),
                TaskCreation::Reused(task) => report.reused.push(task),
            }
        }

        info!(
            branch = %branch_name,
            commit = %commit,
            created = report.created.len(),
            reused = report.reused.len(),
            rejected = report.rejected.len(),
            "batch tasks created"
        );
        Ok(report)
    }

    /// Archives a failed or succeeded task and deletes its artifacts.
    ///
    /// Artifact deletion is best effort: each format is attempted and
    /// failures are reported, not raised.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks,
    /// [`TaskLifecycleError::Domain`] when the task is not finished, and
    /// [`TaskRepositoryError::StatusConflict`] (wrapped) when the status
    /// changed concurrently.
    pub async fn archive(&self, id: TaskId) -> TaskLifecycleResult<ArchiveReport> {
        let mut task = self
            .store
            .find_task(id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(id))?;
        let previous = task.status();
        task.archive(&*self.clock)?;
        self.store.update_status(&task, previous).await?;
        info!(task_id = %id, "task archived");

        let mut cleanup_failures = Vec::new();
        for format in self.project.artifact_formats()? {
            if let Err(err) = self.artifacts.remove(&task, &format) {
                warn!(
                    task_id = %id,
                    format = %format,
                    error = %err,
                    "failed to remove artifact"
                );
                cleanup_failures.push(ArtifactCleanupFailure {
                    format,
                    reason: err.to_string(),
                });
            }
        }

        Ok(ArchiveReport {
            task,
            cleanup_failures,
        })
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when lookup fails.
    pub async fn find_by_id(&self, id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.store.find_task(id).await?)
    }

    /// Returns one page of tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when lookup fails.
    pub async fn list_recent(&self, offset: usize, limit: usize) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.store.list_recent(offset, limit).await?)
    }

    /// Renders the source link for a task's commit.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Config`] when the template fails.
    pub fn commit_url(&self, task: &Task) -> TaskLifecycleResult<String> {
        Ok(self.project.render_commit_url(task.commit())?)
    }

    async fn ensure_servable(&self, requirements: &TaskRequirements) -> TaskLifecycleResult<()> {
        let candidates = self
            .matcher
            .candidates(requirements.platform(), requirements.tags())
            .await?;
        if candidates.is_empty() {
            return Err(CapabilityRegistryError::NoSuitableCapability {
                platform: requirements.platform().clone(),
                tags: requirements.tags().clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn store_or_reuse(
        &self,
        poster: PosterId,
        requirements: TaskRequirements,
        commit: CommitId,
    ) -> TaskLifecycleResult<TaskCreation> {
        let task = Task::new(poster, requirements, commit, &*self.clock);
        match self.store.store_or_reuse(&task).await? {
            TaskInsertion::Stored => {
                info!(
                    task_id = %task.id(),
                    platform = %task.requirements().platform(),
                    tags = %task.requirements().tags(),
                    commit = %task.commit(),
                    "task created"
                );
                Ok(TaskCreation::Created(task))
            }
            TaskInsertion::Reused(existing) => {
                info!(task_id = %existing.id(), "equivalent task reused");
                Ok(TaskCreation::Reused(existing))
            }
        }
    }
}

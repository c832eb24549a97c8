//! Builder-facing heartbeat, capability and upload handling.

use crate::builder::{
    domain::{Builder, BuilderId, BuilderToken},
    ports::{BuilderRepository, BuilderRepositoryError},
};
use crate::config::{ConfigError, CoordinatorConfig, ProjectConfig};
use crate::dispatch::{
    domain::{AssignedWork, BuilderResponse, DispatchRejection, HeartbeatRequest, WireStatus},
    ports::{DispatchStore, DispatchStoreError, TransitionOutcome},
};
use crate::matrix::{
    domain::CapabilityDeclaration,
    ports::CapabilityRepository,
    services::{CapabilityRegistry, CapabilityRegistryError},
};
use crate::task::{
    domain::{ArtifactFormat, BuildOutcome, Task, TaskDomainError, TaskId},
    ports::{ArtifactStore, ArtifactStoreError},
};
use mockable::Clock;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors raised while handling builder requests.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    /// Builder lookup failed.
    #[error(transparent)]
    Builder(#[from] BuilderRepositoryError),
    /// A dispatch write failed.
    #[error(transparent)]
    Store(#[from] DispatchStoreError),
    /// A capability update failed.
    #[error(transparent)]
    Capability(#[from] CapabilityRegistryError),
    /// An artifact could not be written.
    #[error(transparent)]
    Artifact(#[from] ArtifactStoreError),
    /// A request value failed validation.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The project configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An upload arrived from a builder holding no task.
    #[error("builder {0} holds no task")]
    NoAssignedTask(BuilderId),
    /// An upload used a format the project does not produce.
    #[error("artifact format {0} is not configured")]
    UnknownFormat(ArtifactFormat),
    /// The stored records do not allow the upload.
    #[error(transparent)]
    Rejected(#[from] DispatchRejection),
}

impl HeartbeatError {
    /// Returns the HTTP status code for the error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Capability(CapabilityRegistryError::Domain(_))
            | Self::Domain(_)
            | Self::NoAssignedTask(_)
            | Self::UnknownFormat(_)
            | Self::Rejected(_) => 400,
            Self::Builder(_)
            | Self::Store(_)
            | Self::Capability(_)
            | Self::Artifact(_)
            | Self::Config(_) => 500,
        }
    }
}

/// Result type for heartbeat service operations.
pub type HeartbeatResult<T> = Result<T, HeartbeatError>;

/// Handles every request a builder sends.
///
/// Requests from one builder are processed one at a time; requests from
/// different builders run concurrently.
pub struct HeartbeatService<S, A, C>
where
    S: BuilderRepository + CapabilityRepository + DispatchStore,
    A: ArtifactStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    registry: CapabilityRegistry<S>,
    artifacts: Arc<A>,
    clock: Arc<C>,
    project: ProjectConfig,
    locks: Mutex<HashMap<BuilderId, Arc<Mutex<()>>>>,
}

impl<S, A, C> HeartbeatService<S, A, C>
where
    S: BuilderRepository + CapabilityRepository + DispatchStore,
    A: ArtifactStore,
    C: Clock + Send + Sync,
{
    /// Creates a heartbeat service.
    #[must_use]
    pub fn new(store: Arc<S>, artifacts: Arc<A>, clock: Arc<C>, config: &CoordinatorConfig) -> Self {
        Self {
            registry: CapabilityRegistry::new(Arc::clone(&store)),
            store,
            artifacts,
            clock,
            project: config.project.clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Records a heartbeat and applies the status it reports.
    ///
    /// An `IDLE` heartbeat from a builder holding an undelivered task returns
    /// that task, exactly once. `UPLOADING`, `FAILED` and `SUCCEEDED` apply
    /// to the task named in the request, or, when none is named, to the task
    /// the builder holds if it has already been delivered. A report naming no
    /// task never touches an undelivered assignment. Reports the state
    /// machine rejects are logged and acknowledged without changing
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError`] only for storage failures.
    pub async fn heartbeat(&self, request: HeartbeatRequest) -> HeartbeatResult<BuilderResponse> {
        let Some(builder) = self.authenticate(request.token()).await? else {
            return Ok(BuilderResponse::Forbidden);
        };
        let lock = self.builder_lock(builder.id()).await;
        let _serialized = lock.lock().await;

        let status = request.status();
        let record = self
            .store
            .record_heartbeat(builder.id(), status.is_idle(), self.clock.utc())
            .await?;
        debug!(builder_id = %builder.id(), status = %status, "heartbeat recorded");

        let outcome = match status {
            WireStatus::Idle => {
                return Ok(Self::idle_response(
                    &record.builder,
                    record.delivered.as_ref(),
                    &self.project,
                ));
            }
            WireStatus::Building => return Ok(BuilderResponse::NoContent),
            WireStatus::Uploading => None,
            WireStatus::Failed => Some(BuildOutcome::Failed),
            WireStatus::Succeeded => Some(BuildOutcome::Succeeded),
        };

        let Some(task_id) = request
            .task_id()
            .or_else(|| Self::delivered_task(&record.builder))
        else {
            Self::log_unattributed_report(&record.builder, status);
            return Ok(BuilderResponse::NoContent);
        };
        self.apply_report(builder.id(), task_id, outcome).await?;
        Ok(BuilderResponse::NoContent)
    }

    /// Replaces the capability set of the authenticated builder.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::Capability`] for invalid declarations or
    /// storage failures.
    pub async fn update_capabilities(
        &self,
        token: &str,
        declarations: Vec<CapabilityDeclaration>,
    ) -> HeartbeatResult<BuilderResponse> {
        let Some(builder) = self.authenticate(token).await? else {
            return Ok(BuilderResponse::Forbidden);
        };
        let lock = self.builder_lock(builder.id()).await;
        let _serialized = lock.lock().await;

        let entries = self
            .registry
            .replace_capabilities(builder.id(), declarations)
            .await?;
        info!(
            builder_id = %builder.id(),
            entries = entries.len(),
            "builder capabilities updated"
        );
        Ok(BuilderResponse::NoContent)
    }

    /// Stores an artifact for the task the builder holds.
    ///
    /// The task moves to `uploading` first if it is still `building`.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::NoAssignedTask`] when the builder holds no
    /// delivered task, [`HeartbeatError::UnknownFormat`] for formats the project does
    /// not produce, [`HeartbeatError::Rejected`] when the task cannot enter
    /// `uploading`, and storage errors otherwise.
    pub async fn upload_artifact(
        &self,
        token: &str,
        format: &str,
        content: &[u8],
    ) -> HeartbeatResult<BuilderResponse> {
        let Some(builder) = self.authenticate(token).await? else {
            return Ok(BuilderResponse::Forbidden);
        };
        let lock = self.builder_lock(builder.id()).await;
        let _serialized = lock.lock().await;

        let current = self
            .store
            .find_builder(builder.id())
            .await?
            .ok_or(BuilderRepositoryError::NotFound(builder.id()))?;
        let task_id = Self::delivered_task(&current)
            .ok_or(HeartbeatError::NoAssignedTask(builder.id()))?;

        let format = ArtifactFormat::new(format)?;
        if !self.project.artifact_formats()?.contains(&format) {
            return Err(HeartbeatError::UnknownFormat(format));
        }

        let outcome = self
            .store
            .begin_upload(task_id, builder.id(), self.clock.utc())
            .await
            .map_err(|err| match err {
                DispatchStoreError::Rejected(rejection) => HeartbeatError::Rejected(rejection),
                other => HeartbeatError::Store(other),
            })?;

        let mut sink = self.artifacts.open_sink(outcome.task(), &format)?;
        sink.write_all(content).map_err(ArtifactStoreError::from)?;
        sink.flush().map_err(ArtifactStoreError::from)?;

        info!(
            task_id = %task_id,
            builder_id = %builder.id(),
            format = %format,
            bytes = content.len(),
            "artifact stored"
        );
        Ok(BuilderResponse::NoContent)
    }

    async fn authenticate(&self, token: &str) -> HeartbeatResult<Option<Builder>> {
        if token.trim().is_empty() {
            return Ok(None);
        }
        let digest = BuilderToken::from_raw(token).digest();
        let builder = self.store.find_by_token(&digest).await?;
        if builder.is_none() {
            warn!("request with unknown builder token");
        }
        Ok(builder)
    }

    /// Returns the request lock for `builder_id`.
    ///
    /// Entries no request holds any more are dropped on the way, so the map
    /// only tracks builders with requests in flight.
    async fn builder_lock(&self, builder_id: BuilderId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|id, lock| *id == builder_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(builder_id).or_default())
    }

    #[cfg(test)]
    pub(crate) async fn tracked_builder_locks(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// The held task, but only once the builder has actually received it.
    fn delivered_task(builder: &Builder) -> Option<TaskId> {
        builder
            .assigned_task()
            .filter(|_| builder.assignment_delivered())
    }

    fn log_unattributed_report(builder: &Builder, status: WireStatus) {
        if let Some(task_id) = builder.assigned_task() {
            warn!(
                builder_id = %builder.id(),
                task_id = %task_id,
                status = %status,
                "report names no task and the held task was never delivered"
            );
            return;
        }
        debug!(builder_id = %builder.id(), status = %status, "report names no task");
    }

    fn idle_response(
        builder: &Builder,
        delivered: Option<&Task>,
        project: &ProjectConfig,
    ) -> BuilderResponse {
        if let Some(task) = delivered {
            info!(task_id = %task.id(), builder_id = %builder.id(), "task delivered");
            return BuilderResponse::Assigned(Box::new(AssignedWork::new(task, project)));
        }
        if let Some(task_id) = builder.assigned_task() {
            warn!(
                task_id = %task_id,
                builder_id = %builder.id(),
                "builder reports idle while holding a delivered task"
            );
        }
        BuilderResponse::NoContent
    }

    async fn apply_report(
        &self,
        builder_id: BuilderId,
        task_id: TaskId,
        outcome: Option<BuildOutcome>,
    ) -> HeartbeatResult<()> {
        let at = self.clock.utc();
        let result = match outcome {
            None => self.store.begin_upload(task_id, builder_id, at).await,
            Some(outcome) => self.store.release(task_id, builder_id, outcome, at).await,
        };

        match result {
            Ok(TransitionOutcome::Applied(task)) => {
                info!(
                    task_id = %task_id,
                    builder_id = %builder_id,
                    status = %task.status(),
                    "task status updated"
                );
                Ok(())
            }
            Ok(TransitionOutcome::AlreadyApplied(task)) => {
                debug!(
                    task_id = %task_id,
                    builder_id = %builder_id,
                    status = %task.status(),
                    "repeated status report"
                );
                Ok(())
            }
            Err(DispatchStoreError::Rejected(rejection)) => {
                warn!(
                    task_id = %task_id,
                    builder_id = %builder_id,
                    reason = %rejection,
                    "status report ignored"
                );
                Ok(())
            }
            Err(DispatchStoreError::TaskNotFound(_)) => {
                warn!(task_id = %task_id, builder_id = %builder_id, "report names unknown task");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

//! In-memory store for tests and single-process deployments.

use crate::builder::{
    domain::{Builder, BuilderId, BuilderName, PersistedBuilderData, TokenDigest},
    ports::{BuilderRepository, BuilderRepositoryError, BuilderRepositoryResult},
};
use crate::dispatch::{
    domain::{TransitionEffect, apply_assignment, apply_release, apply_upload},
    ports::{
        DispatchStore, DispatchStoreError, DispatchStoreResult, HeartbeatRecord,
        TransitionOutcome,
    },
};
use crate::matrix::{
    domain::{CapabilityEntry, Platform},
    ports::{CapabilityRepository, CapabilityRepositoryError, CapabilityRepositoryResult},
};
use crate::task::{
    domain::{BuildOutcome, Task, TaskId, TaskStatus},
    ports::{TaskInsertion, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory store.
///
/// Every write takes the same lock, so dispatch writes that change a builder
/// and a task are atomic with respect to each other and to readers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    builders: HashMap<BuilderId, Builder>,
    name_index: HashMap<BuilderName, BuilderId>,
    token_index: HashMap<TokenDigest, BuilderId>,
    capabilities: HashMap<BuilderId, Vec<CapabilityEntry>>,
    tasks: HashMap<TaskId, Task>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

/// Keeps the stored liveness and assignment fields while taking the profile
/// fields from `update`.
fn merge_profile(stored: &Builder, update: &Builder) -> Builder {
    Builder::from_persisted(PersistedBuilderData {
        id: stored.id(),
        name: update.name().clone(),
        token_digest: update.token_digest().clone(),
        trust_level: update.trust_level(),
        idle: stored.is_idle(),
        last_heartbeat: stored.last_heartbeat(),
        assigned_task: stored.assigned_task(),
        assignment_delivered: stored.assignment_delivered(),
        created_at: stored.created_at(),
        updated_at: update.updated_at(),
    })
}

fn is_equivalent(existing: &Task, candidate: &Task) -> bool {
    existing.requirements() == candidate.requirements()
        && existing.commit() == candidate.commit()
        && !matches!(existing.status(), TaskStatus::Failed | TaskStatus::Archived)
}

impl StoreState {
    fn builder_for_dispatch(&self, id: BuilderId) -> DispatchStoreResult<Builder> {
        self.builders
            .get(&id)
            .cloned()
            .ok_or(DispatchStoreError::BuilderNotFound(id))
    }

    fn task_for_dispatch(&self, id: TaskId) -> DispatchStoreResult<Task> {
        self.tasks
            .get(&id)
            .cloned()
            .ok_or(DispatchStoreError::TaskNotFound(id))
    }

    fn put_builder(&mut self, builder: Builder) {
        self.builders.insert(builder.id(), builder);
    }

    fn put_task(&mut self, task: Task) {
        self.tasks.insert(task.id(), task);
    }
}

#[async_trait]
impl BuilderRepository for InMemoryStore {
    async fn register(&self, builder: &Builder) -> BuilderRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        if state.builders.contains_key(&builder.id()) {
            return Err(BuilderRepositoryError::DuplicateBuilder(builder.id()));
        }
        if state.name_index.contains_key(builder.name()) {
            return Err(BuilderRepositoryError::DuplicateBuilderName(
                builder.name().clone(),
            ));
        }

        state.name_index.insert(builder.name().clone(), builder.id());
        state
            .token_index
            .insert(builder.token_digest().clone(), builder.id());
        state.put_builder(builder.clone());
        Ok(())
    }

    async fn update_profile(&self, builder: &Builder) -> BuilderRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        let stored = state
            .builders
            .get(&builder.id())
            .cloned()
            .ok_or(BuilderRepositoryError::NotFound(builder.id()))?;

        if let Some(owner) = state.name_index.get(builder.name())
            && *owner != builder.id()
        {
            return Err(BuilderRepositoryError::DuplicateBuilderName(
                builder.name().clone(),
            ));
        }

        state.name_index.remove(stored.name());
        state.name_index.insert(builder.name().clone(), builder.id());
        state.token_index.remove(stored.token_digest());
        state
            .token_index
            .insert(builder.token_digest().clone(), builder.id());
        state.put_builder(merge_profile(&stored, builder));
        Ok(())
    }

    async fn find_builder(&self, id: BuilderId) -> BuilderRepositoryResult<Option<Builder>> {
        let state = self
            .state
            .read()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        Ok(state.builders.get(&id).cloned())
    }

    async fn find_by_token(&self, digest: &TokenDigest) -> BuilderRepositoryResult<Option<Builder>> {
        let state = self
            .state
            .read()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        Ok(state
            .token_index
            .get(digest)
            .and_then(|id| state.builders.get(id))
            .cloned())
    }

    async fn find_by_name(&self, name: &BuilderName) -> BuilderRepositoryResult<Option<Builder>> {
        let state = self
            .state
            .read()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        Ok(state
            .name_index
            .get(name)
            .and_then(|id| state.builders.get(id))
            .cloned())
    }

    async fn list_builders(&self) -> BuilderRepositoryResult<Vec<Builder>> {
        let state = self
            .state
            .read()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        let mut builders: Vec<Builder> = state.builders.values().cloned().collect();
        builders.sort_by_key(|builder| (builder.created_at(), builder.id()));
        Ok(builders)
    }

    async fn delete_builder(&self, id: BuilderId) -> BuilderRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| BuilderRepositoryError::persistence(poisoned(err)))?;
        let stored = state
            .builders
            .get(&id)
            .cloned()
            .ok_or(BuilderRepositoryError::NotFound(id))?;
        if let Some(task_id) = stored.assigned_task() {
            return Err(BuilderRepositoryError::Busy {
                builder_id: id,
                task_id,
            });
        }

        state.name_index.remove(stored.name());
        state.token_index.remove(stored.token_digest());
        state.capabilities.remove(&id);
        state.builders.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CapabilityRepository for InMemoryStore {
    async fn replace_capabilities(
        &self,
        builder_id: BuilderId,
        entries: &[CapabilityEntry],
    ) -> CapabilityRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| CapabilityRepositoryError::persistence(poisoned(err)))?;
        if !state.builders.contains_key(&builder_id) {
            return Err(CapabilityRepositoryError::BuilderNotFound(builder_id));
        }
        if let Some(foreign) = entries.iter().find(|entry| entry.builder_id() != builder_id) {
            return Err(CapabilityRepositoryError::ForeignEntry {
                expected: builder_id,
                found: foreign.builder_id(),
            });
        }

        state.capabilities.insert(builder_id, entries.to_vec());
        Ok(())
    }

    async fn capabilities_of(
        &self,
        builder_id: BuilderId,
    ) -> CapabilityRepositoryResult<Vec<CapabilityEntry>> {
        let state = self
            .state
            .read()
            .map_err(|err| CapabilityRepositoryError::persistence(poisoned(err)))?;
        Ok(state
            .capabilities
            .get(&builder_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn entries_for_platform(
        &self,
        platform: &Platform,
    ) -> CapabilityRepositoryResult<Vec<CapabilityEntry>> {
        let state = self
            .state
            .read()
            .map_err(|err| CapabilityRepositoryError::persistence(poisoned(err)))?;
        let mut entries: Vec<CapabilityEntry> = state
            .capabilities
            .values()
            .flatten()
            .filter(|entry| entry.platform() == platform)
            .cloned()
            .collect();
        entries.sort_by_key(CapabilityEntry::builder_id);
        Ok(entries)
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TaskRepositoryError::persistence(poisoned(err)))?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.put_task(task.clone());
        Ok(())
    }

    async fn store_or_reuse(&self, task: &Task) -> TaskRepositoryResult<TaskInsertion> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TaskRepositoryError::persistence(poisoned(err)))?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }

        let existing = state
            .tasks
            .values()
            .filter(|stored| is_equivalent(stored, task))
            .min_by_key(|stored| (stored.created_at(), stored.id()))
            .cloned();
        if let Some(existing) = existing {
            return Ok(TaskInsertion::Reused(existing));
        }

        state.put_task(task.clone());
        Ok(TaskInsertion::Stored)
    }

    async fn update_status(&self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| TaskRepositoryError::persistence(poisoned(err)))?;
        let stored = state
            .tasks
            .get(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if stored.status() != expected {
            return Err(TaskRepositoryError::StatusConflict {
                task_id: task.id(),
                expected,
                found: stored.status(),
            });
        }
        state.put_task(task.clone());
        Ok(())
    }

    async fn find_task(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskRepositoryError::persistence(poisoned(err)))?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_pending(&self) -> TaskRepositoryResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskRepositoryError::persistence(poisoned(err)))?;
        let mut pending: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(pending)
    }

    async fn list_recent(&self, offset: usize, limit: usize) -> TaskRepositoryResult<Vec<Task>> {
        let state = self
            .state
            .read()
            .map_err(|err| TaskRepositoryError::persistence(poisoned(err)))?;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by(|left, right| {
            (right.created_at(), right.id()).cmp(&(left.created_at(), left.id()))
        });
        Ok(tasks.into_iter().skip(offset).take(limit).collect())
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn find_idle_builder(
        &self,
        candidates: &[BuilderId],
        live_since: DateTime<Utc>,
    ) -> DispatchStoreResult<Option<BuilderId>> {
        let state = self
            .state
            .read()
            .map_err(|err| DispatchStoreError::persistence(poisoned(err)))?;
        Ok(candidates
            .iter()
            .filter_map(|id| state.builders.get(id))
            .filter(|builder| builder.is_available(live_since))
            .min_by_key(|builder| (builder.created_at(), builder.id()))
            .map(Builder::id))
    }

    async fn assign(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        live_since: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<Task> {
        let mut state = self
            .state
            .write()
            .map_err(|err| DispatchStoreError::persistence(poisoned(err)))?;
        let mut task = state.task_for_dispatch(task_id)?;
        let mut builder = state.builder_for_dispatch(builder_id)?;

        apply_assignment(&mut task, &mut builder, live_since, at)?;

        state.put_builder(builder);
        state.put_task(task.clone());
        Ok(task)
    }

    async fn record_heartbeat(
        &self,
        builder_id: BuilderId,
        reported_idle: bool,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<HeartbeatRecord> {
        let mut state = self
            .state
            .write()
            .map_err(|err| DispatchStoreError::persistence(poisoned(err)))?;
        let mut builder = state.builder_for_dispatch(builder_id)?;

        let delivered = builder
            .record_heartbeat(reported_idle, at)
            .map(|task_id| state.task_for_dispatch(task_id))
            .transpose()?;

        state.put_builder(builder.clone());
        Ok(HeartbeatRecord { builder, delivered })
    }

    async fn begin_upload(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<TransitionOutcome> {
        let mut state = self
            .state
            .write()
            .map_err(|err| DispatchStoreError::persistence(poisoned(err)))?;
        let mut task = state.task_for_dispatch(task_id)?;
        let builder = state.builder_for_dispatch(builder_id)?;

        match apply_upload(&mut task, &builder, at)? {
            TransitionEffect::Unchanged => Ok(TransitionOutcome::AlreadyApplied(task)),
            TransitionEffect::Applied => {
                state.put_task(task.clone());
                Ok(TransitionOutcome::Applied(task))
            }
        }
    }

    async fn release(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        outcome: BuildOutcome,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<TransitionOutcome> {
        let mut state = self
            .state
            .write()
            .map_err(|err| DispatchStoreError::persistence(poisoned(err)))?;
        let mut task = state.task_for_dispatch(task_id)?;
        let mut builder = state.builder_for_dispatch(builder_id)?;

        match apply_release(&mut task, &mut builder, outcome, at)? {
            TransitionEffect::Unchanged => Ok(TransitionOutcome::AlreadyApplied(task)),
            TransitionEffect::Applied => {
                state.put_builder(builder);
                state.put_task(task.clone());
                Ok(TransitionOutcome::Applied(task))
            }
        }
    }
}

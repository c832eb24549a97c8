//! Timer-driven assignment of pending tasks to idle builders.

use crate::builder::domain::BuilderId;
use crate::config::{CoordinatorConfig, LivenessConfig};
use crate::dispatch::{
    domain::{Assignment, CycleReport},
    ports::{DispatchStore, DispatchStoreError},
};
use crate::matrix::{
    ports::CapabilityRepository,
    services::{CapabilityRegistryError, MatchEngine},
};
use crate::task::{
    domain::Task,
    ports::{TaskRepository, TaskRepositoryError},
};
use mockable::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Errors raised while scheduling.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Pending tasks could not be loaded.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// Candidate lookup failed.
    #[error(transparent)]
    Capability(#[from] CapabilityRegistryError),
    /// An assignment write failed.
    #[error(transparent)]
    Store(#[from] DispatchStoreError),
    /// The background loop panicked or was cancelled.
    #[error("scheduler task failed: {0}")]
    Join(Arc<JoinError>),
}

/// What happened to a single pending task during a cycle.
enum Disposition {
    Assigned(BuilderId),
    Unmatched,
    AwaitingBuilder,
    Conflict,
}

/// Periodically assigns pending tasks, oldest first, to idle live builders.
///
/// Cycles never overlap: [`Self::run_cycle`] holds an internal lock for the
/// whole cycle, and the background loop waits for each cycle before
/// scheduling the next tick.
pub struct AssignmentScheduler<S, C>
where
    S: TaskRepository + CapabilityRepository + DispatchStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    matcher: MatchEngine<S>,
    clock: Arc<C>,
    interval: Duration,
    liveness: LivenessConfig,
    cycle_lock: Mutex<()>,
}

impl<S, C> AssignmentScheduler<S, C>
where
    S: TaskRepository + CapabilityRepository + DispatchStore,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler using the interval and liveness window from
    /// `config`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>, config: &CoordinatorConfig) -> Self {
        Self {
            matcher: MatchEngine::new(Arc::clone(&store)),
            store,
            clock,
            interval: config.scheduler.interval(),
            liveness: config.liveness.clone(),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Returns the time between cycles.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one assignment cycle.
    ///
    /// Each pending task is evaluated independently; a failure for one task
    /// is logged and recorded in the report without stopping the cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Repository`] only when the pending task list
    /// cannot be loaded.
    pub async fn run_cycle(&self) -> Result<CycleReport, SchedulerError> {
        let _cycle = self.cycle_lock.lock().await;
        let pending = self.store.list_pending().await?;
        debug!(pending = pending.len(), "assignment cycle started");

        let mut claimed = HashSet::new();
        let mut report = CycleReport::default();
        for task in &pending {
            match self.schedule_task(task, &mut claimed).await {
                Ok(Disposition::Assigned(builder_id)) => report.assigned.push(Assignment {
                    task_id: task.id(),
                    builder_id,
                }),
                Ok(Disposition::Unmatched) => report.unmatched.push(task.id()),
                Ok(Disposition::AwaitingBuilder) => report.awaiting_builder.push(task.id()),
                Ok(Disposition::Conflict) => report.conflicts.push(task.id()),
                Err(err) => {
                    error!(task_id = %task.id(), error = %err, "failed to schedule task");
                    report.failed.push(task.id());
                }
            }
        }

        debug!(
            assigned = report.assigned.len(),
            unmatched = report.unmatched.len(),
            awaiting_builder = report.awaiting_builder.len(),
            conflicts = report.conflicts.len(),
            failed = report.failed.len(),
            "assignment cycle finished"
        );
        Ok(report)
    }

    async fn schedule_task(
        &self,
        task: &Task,
        claimed: &mut HashSet<BuilderId>,
    ) -> Result<Disposition, SchedulerError> {
        let requirements = task.requirements();
        let candidates = match self
            .matcher
            .candidates(requirements.platform(), requirements.tags())
            .await
        {
            Ok(candidates) => candidates,
            Err(CapabilityRegistryError::NoSuitableCapability { .. }) => {
                info!(
                    task_id = %task.id(),
                    platform = %requirements.platform(),
                    "no builder declares the task platform"
                );
                return Ok(Disposition::Unmatched);
            }
            Err(err) => return Err(err.into()),
        };
        if candidates.is_empty() {
            info!(
                task_id = %task.id(),
                platform = %requirements.platform(),
                tags = %requirements.tags(),
                "no builder offers the task tags"
            );
            return Ok(Disposition::Unmatched);
        }

        let unclaimed: Vec<BuilderId> = candidates
            .into_iter()
            .filter(|builder_id| !claimed.contains(builder_id))
            .collect();
        if unclaimed.is_empty() {
            return Ok(Disposition::AwaitingBuilder);
        }

        let now = self.clock.utc();
        let live_since = self.liveness.live_since(now);
        let Some(builder_id) = self.store.find_idle_builder(&unclaimed, live_since).await? else {
            debug!(task_id = %task.id(), "no idle builder for task");
            return Ok(Disposition::AwaitingBuilder);
        };

        match self.store.assign(task.id(), builder_id, live_since, now).await {
            Ok(_) => {
                claimed.insert(builder_id);
                info!(task_id = %task.id(), builder_id = %builder_id, "task assigned");
                Ok(Disposition::Assigned(builder_id))
            }
            Err(err) => match err.as_conflict() {
                Some(conflict) => {
                    debug!(
                        task_id = %task.id(),
                        builder_id = %builder_id,
                        conflict = %conflict,
                        "assignment lost a race, retrying next cycle"
                    );
                    Ok(Disposition::Conflict)
                }
                None => Err(err.into()),
            },
        }
    }
}

impl<S, C> AssignmentScheduler<S, C>
where
    S: TaskRepository + CapabilityRepository + DispatchStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Starts running cycles on the configured interval.
    ///
    /// The first cycle runs immediately. The loop stops when
    /// [`SchedulerHandle::stop`] is called or the handle is dropped.
    #[must_use]
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let interval = self.interval;
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "assignment scheduler started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.run_cycle().await {
                            error!(error = %err, "assignment cycle failed");
                        }
                    }
                }
            }

            info!("assignment scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals the loop to stop and waits for the current cycle to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Join`] when the loop panicked.
    pub async fn stop(self) -> Result<(), SchedulerError> {
        if self.shutdown.send(()).is_err() {
            debug!("assignment scheduler already stopped");
        }
        self.join
            .await
            .map_err(|err| SchedulerError::Join(Arc::new(err)))
    }

    /// Returns whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

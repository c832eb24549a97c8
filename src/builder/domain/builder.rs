//! Builder aggregate root.

use super::{BuilderDomainError, BuilderId, BuilderName, BuilderToken, TokenDigest, TrustLevel};
use crate::task::domain::TaskId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presentation status derived from a builder's heartbeat and assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderLiveness {
    /// No heartbeat within the liveness window.
    Offline,
    /// Live, idle and without a task.
    Idle,
    /// Live but holding a task or self-reporting work.
    Busy,
}

impl BuilderLiveness {
    /// Returns the canonical display representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Idle => "idle",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for BuilderLiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered build worker.
///
/// A builder holds at most one task. Holding a task always implies the
/// builder is not idle; a builder without a task may still be non-idle when
/// its own latest heartbeat reported work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    id: BuilderId,
    name: BuilderName,
    token_digest: TokenDigest,
    trust_level: TrustLevel,
    idle: bool,
    last_heartbeat: Option<DateTime<Utc>>,
    assigned_task: Option<TaskId>,
    assignment_delivered: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBuilderData {
    /// Persisted builder identifier.
    pub id: BuilderId,
    /// Persisted display name.
    pub name: BuilderName,
    /// Persisted token digest.
    pub token_digest: TokenDigest,
    /// Persisted trust level.
    pub trust_level: TrustLevel,
    /// Persisted idle flag.
    pub idle: bool,
    /// Timestamp of the most recent heartbeat, if any.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Task currently held by the builder, if any.
    pub assigned_task: Option<TaskId>,
    /// Whether the held task has been handed to the builder.
    pub assignment_delivered: bool,
    /// Persisted registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest profile or assignment timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Builder {
    /// Creates a newly registered builder.
    ///
    /// New builders are idle, approved, and have never sent a heartbeat, so
    /// they are not match candidates until they first check in.
    #[must_use]
    pub fn new(name: BuilderName, token: &BuilderToken, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: BuilderId::new(),
            name,
            token_digest: token.digest(),
            trust_level: TrustLevel::default(),
            idle: true,
            last_heartbeat: None,
            assigned_task: None,
            assignment_delivered: false,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a builder from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedBuilderData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            token_digest: data.token_digest,
            trust_level: data.trust_level,
            idle: data.idle,
            last_heartbeat: data.last_heartbeat,
            assigned_task: data.assigned_task,
            assignment_delivered: data.assignment_delivered,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the builder identifier.
    #[must_use]
    pub const fn id(&self) -> BuilderId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &BuilderName {
        &self.name
    }

    /// Returns the stored token digest.
    #[must_use]
    pub const fn token_digest(&self) -> &TokenDigest {
        &self.token_digest
    }

    /// Returns the trust level.
    #[must_use]
    pub const fn trust_level(&self) -> TrustLevel {
        self.trust_level
    }

    /// Returns the idle flag.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.idle
    }

    /// Returns the most recent heartbeat timestamp.
    #[must_use]
    pub const fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }

    /// Returns the task currently held by the builder.
    #[must_use]
    pub const fn assigned_task(&self) -> Option<TaskId> {
        self.assigned_task
    }

    /// Returns whether the held task has been delivered in a heartbeat.
    #[must_use]
    pub const fn assignment_delivered(&self) -> bool {
        self.assignment_delivered
    }

    /// Returns the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest profile or assignment timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether a heartbeat arrived at or after `live_since`.
    #[must_use]
    pub fn is_live(&self, live_since: DateTime<Utc>) -> bool {
        self.last_heartbeat.is_some_and(|at| at >= live_since)
    }

    /// Returns whether the builder may be handed a new task.
    #[must_use]
    pub fn is_available(&self, live_since: DateTime<Utc>) -> bool {
        self.idle && self.assigned_task.is_none() && self.is_live(live_since)
    }

    /// Derives the presentation status.
    #[must_use]
    pub fn liveness(&self, live_since: DateTime<Utc>) -> BuilderLiveness {
        if !self.is_live(live_since) {
            BuilderLiveness::Offline
        } else if self.idle && self.assigned_task.is_none() {
            BuilderLiveness::Idle
        } else {
            BuilderLiveness::Busy
        }
    }

    /// Renames the builder.
    pub fn rename(&mut self, name: BuilderName, clock: &impl Clock) {
        self.name = name;
        self.touch(clock.utc());
    }

    /// Changes the trust level.
    pub fn set_trust_level(&mut self, trust_level: TrustLevel, clock: &impl Clock) {
        self.trust_level = trust_level;
        self.touch(clock.utc());
    }

    /// Replaces the stored token digest, invalidating the previous token.
    pub fn rotate_token(&mut self, token: &BuilderToken, clock: &impl Clock) {
        self.token_digest = token.digest();
        self.touch(clock.utc());
    }

    /// Records a heartbeat received at `at`.
    ///
    /// Returns the held task when this heartbeat is the one that delivers it:
    /// the builder reported idle while holding a task that had not been
    /// handed over yet. Each assignment is delivered at most once.
    pub fn record_heartbeat(&mut self, reported_idle: bool, at: DateTime<Utc>) -> Option<TaskId> {
        self.last_heartbeat = Some(at);
        let Some(task_id) = self.assigned_task else {
            self.idle = reported_idle;
            return None;
        };

        self.idle = false;
        if reported_idle && !self.assignment_delivered {
            self.assignment_delivered = true;
            return Some(task_id);
        }
        None
    }

    /// Marks the builder busy with `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderDomainError::BuilderBusy`] when a task is already
    /// held, or [`BuilderDomainError::BuilderNotIdle`] when the builder's own
    /// latest heartbeat reported work.
    pub fn claim(&mut self, task_id: TaskId, at: DateTime<Utc>) -> Result<(), BuilderDomainError> {
        if let Some(current) = self.assigned_task {
            return Err(BuilderDomainError::BuilderBusy {
                builder_id: self.id,
                task_id: current,
            });
        }
        if !self.idle {
            return Err(BuilderDomainError::BuilderNotIdle(self.id));
        }

        self.idle = false;
        self.assigned_task = Some(task_id);
        self.assignment_delivered = false;
        self.touch(at);
        Ok(())
    }

    /// Frees the builder from `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderDomainError::TaskNotAssigned`] when the builder does
    /// not hold `task_id`.
    pub fn release(&mut self, task_id: TaskId, at: DateTime<Utc>) -> Result<(), BuilderDomainError> {
        if self.assigned_task != Some(task_id) {
            return Err(BuilderDomainError::TaskNotAssigned {
                builder_id: self.id,
                task_id,
            });
        }

        self.idle = true;
        self.assigned_task = None;
        self.assignment_delivered = false;
        self.touch(at);
        Ok(())
    }

    const fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

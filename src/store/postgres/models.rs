//! Diesel row models and their conversions to domain types.

use super::schema::{builder_capabilities, builders, tasks};
use crate::builder::domain::{
    Builder, BuilderId, BuilderName, PersistedBuilderData, TokenDigest, TrustLevel,
};
use crate::matrix::domain::{CapabilityEntry, MatrixDomainError, Platform, TagSet};
use crate::task::domain::{
    CommitId, PersistedTaskData, PosterId, Task, TaskId, TaskRequirements, TaskStatus,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use std::error::Error as StdError;

/// Boxed conversion failure, wrapped by each port's `invalid_persisted_data`.
pub(super) type ConversionError = Box<dyn StdError + Send + Sync>;

/// Query result row for builders.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = builders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BuilderRow {
    /// Builder identifier.
    pub id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Token digest.
    pub token_digest: String,
    /// Trust level.
    pub trust_level: String,
    /// Idle flag.
    pub is_idle: bool,
    /// Latest heartbeat.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Held task.
    pub assigned_task_id: Option<uuid::Uuid>,
    /// Delivery flag.
    pub assignment_delivered: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for builders.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = builders)]
pub struct NewBuilderRow {
    /// Builder identifier.
    pub id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Token digest.
    pub token_digest: String,
    /// Trust level.
    pub trust_level: String,
    /// Idle flag.
    pub is_idle: bool,
    /// Latest heartbeat.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Held task.
    pub assigned_task_id: Option<uuid::Uuid>,
    /// Delivery flag.
    pub assignment_delivered: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for capability entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = builder_capabilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CapabilityRow {
    /// Surrogate key.
    pub id: i64,
    /// Owning builder.
    pub builder_id: uuid::Uuid,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
    /// Tag array.
    pub tags: Value,
}

/// Insert model for capability entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = builder_capabilities)]
pub struct NewCapabilityRow {
    /// Owning builder.
    pub builder_id: uuid::Uuid,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
    /// Tag array.
    pub tags: Value,
}

/// Query result row for tasks.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
    /// Tag array.
    pub tags: Value,
    /// Commit hash.
    pub commit_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Poster identity.
    pub poster_id: uuid::Uuid,
    /// Holding builder.
    pub assigned_builder_id: Option<uuid::Uuid>,
    /// Most recent builder.
    pub last_builder_id: Option<uuid::Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for tasks.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
    /// Tag array.
    pub tags: Value,
    /// Commit hash.
    pub commit_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Poster identity.
    pub poster_id: uuid::Uuid,
    /// Holding builder.
    pub assigned_builder_id: Option<uuid::Uuid>,
    /// Most recent builder.
    pub last_builder_id: Option<uuid::Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

pub(super) fn tags_to_value(tags: &TagSet) -> Value {
    Value::from(tags.to_vec())
}

fn tags_from_value(value: Value) -> Result<TagSet, ConversionError> {
    let raw: Vec<String> = serde_json::from_value(value)?;
    Ok(TagSet::new(raw)?)
}

fn platform_from_row(os: String, arch: String) -> Result<Platform, MatrixDomainError> {
    Platform::new(os, arch)
}

impl From<&Builder> for NewBuilderRow {
    fn from(builder: &Builder) -> Self {
        Self {
            id: builder.id().into_inner(),
            name: builder.name().as_str().to_owned(),
            token_digest: builder.token_digest().as_str().to_owned(),
            trust_level: builder.trust_level().as_str().to_owned(),
            is_idle: builder.is_idle(),
            last_heartbeat_at: builder.last_heartbeat(),
            assigned_task_id: builder.assigned_task().map(TaskId::into_inner),
            assignment_delivered: builder.assignment_delivered(),
            created_at: builder.created_at(),
            updated_at: builder.updated_at(),
        }
    }
}

impl TryFrom<BuilderRow> for Builder {
    type Error = ConversionError;

    fn try_from(row: BuilderRow) -> Result<Self, Self::Error> {
        Ok(Self::from_persisted(PersistedBuilderData {
            id: BuilderId::from_uuid(row.id),
            name: BuilderName::new(row.name)?,
            token_digest: TokenDigest::from_persisted(row.token_digest),
            trust_level: TrustLevel::try_from(row.trust_level.as_str())?,
            idle: row.is_idle,
            last_heartbeat: row.last_heartbeat_at,
            assigned_task: row.assigned_task_id.map(TaskId::from_uuid),
            assignment_delivered: row.assignment_delivered,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

impl From<&CapabilityEntry> for NewCapabilityRow {
    fn from(entry: &CapabilityEntry) -> Self {
        Self {
            builder_id: entry.builder_id().into_inner(),
            os: entry.platform().os().to_owned(),
            arch: entry.platform().arch().to_owned(),
            tags: tags_to_value(entry.tags()),
        }
    }
}

impl TryFrom<CapabilityRow> for CapabilityEntry {
    type Error = ConversionError;

    fn try_from(row: CapabilityRow) -> Result<Self, Self::Error> {
        Ok(Self::new(
            BuilderId::from_uuid(row.builder_id),
            platform_from_row(row.os, row.arch)?,
            tags_from_value(row.tags)?,
        ))
    }
}

impl From<&Task> for NewTaskRow {
    fn from(task: &Task) -> Self {
        let requirements = task.requirements();
        Self {
            id: task.id().into_inner(),
            os: requirements.platform().os().to_owned(),
            arch: requirements.platform().arch().to_owned(),
            tags: tags_to_value(requirements.tags()),
            commit_id: task.commit().as_str().to_owned(),
            status: task.status().as_str().to_owned(),
            poster_id: task.poster().into_inner(),
            assigned_builder_id: task.assigned_builder().map(BuilderId::into_inner),
            last_builder_id: task.last_builder().map(BuilderId::into_inner),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = ConversionError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let requirements = TaskRequirements::new(
            platform_from_row(row.os, row.arch)?,
            tags_from_value(row.tags)?,
        );
        Ok(Self::from_persisted(PersistedTaskData {
            id: TaskId::from_uuid(row.id),
            requirements,
            commit: CommitId::new(row.commit_id)?,
            status: TaskStatus::try_from(row.status.as_str())?,
            poster: PosterId::from_uuid(row.poster_id),
            assigned_builder: row.assigned_builder_id.map(BuilderId::from_uuid),
            last_builder: row.last_builder_id.map(BuilderId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

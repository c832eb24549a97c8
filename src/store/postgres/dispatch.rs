//! Dispatch writes spanning a builder row and a task row.

use super::{
    PostgresStore, convert_row,
    models::{BuilderRow, TaskRow},
    schema::{builders, tasks},
};
use crate::builder::domain::{Builder, BuilderId};
use crate::dispatch::{
    domain::{TransitionEffect, apply_assignment, apply_release, apply_upload},
    ports::{
        DispatchStore, DispatchStoreError, DispatchStoreResult, HeartbeatRecord,
        TransitionOutcome,
    },
};
use crate::task::domain::{BuildOutcome, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;

fn lock_task(connection: &mut PgConnection, id: TaskId) -> DispatchStoreResult<Task> {
    let row = tasks::table
        .find(id.into_inner())
        .select(TaskRow::as_select())
        .for_update()
        .first::<TaskRow>(connection)
        .optional()?;
    convert_row::<_, Task, DispatchStoreError>(row)?
        .ok_or(DispatchStoreError::TaskNotFound(id))
}

fn lock_builder(connection: &mut PgConnection, id: BuilderId) -> DispatchStoreResult<Builder> {
    let row = builders::table
        .find(id.into_inner())
        .select(BuilderRow::as_select())
        .for_update()
        .first::<BuilderRow>(connection)
        .optional()?;
    convert_row::<_, Builder, DispatchStoreError>(row)?
        .ok_or(DispatchStoreError::BuilderNotFound(id))
}

fn save_task(connection: &mut PgConnection, task: &Task) -> DispatchStoreResult<()> {
    diesel::update(tasks::table.find(task.id().into_inner()))
        .set((
            tasks::status.eq(task.status().as_str()),
            tasks::assigned_builder_id.eq(task.assigned_builder().map(BuilderId::into_inner)),
            tasks::last_builder_id.eq(task.last_builder().map(BuilderId::into_inner)),
            tasks::updated_at.eq(task.updated_at()),
        ))
        .execute(connection)?;
    Ok(())
}

fn save_builder(connection: &mut PgConnection, builder: &Builder) -> DispatchStoreResult<()> {
    diesel::update(builders::table.find(builder.id().into_inner()))
        .set((
            builders::is_idle.eq(builder.is_idle()),
            builders::last_heartbeat_at.eq(builder.last_heartbeat()),
            builders::assigned_task_id.eq(builder.assigned_task().map(TaskId::into_inner)),
            builders::assignment_delivered.eq(builder.assignment_delivered()),
            builders::updated_at.eq(builder.updated_at()),
        ))
        .execute(connection)?;
    Ok(())
}

#[async_trait]
impl DispatchStore for PostgresStore {
    async fn find_idle_builder(
        &self,
        candidates: &[BuilderId],
        live_since: DateTime<Utc>,
    ) -> DispatchStoreResult<Option<BuilderId>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let ids: Vec<uuid::Uuid> = candidates.iter().copied().map(BuilderId::into_inner).collect();

        self.run_blocking(move |connection| {
            let found = builders::table
                .filter(builders::id.eq_any(&ids))
                .filter(builders::is_idle.eq(true))
                .filter(builders::assigned_task_id.is_null())
                .filter(builders::last_heartbeat_at.ge(live_since))
                .order((builders::created_at.asc(), builders::id.asc()))
                .select(builders::id)
                .first::<uuid::Uuid>(connection)
                .optional()?;
            Ok(found.map(BuilderId::from_uuid))
        })
        .await
    }

    async fn assign(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        live_since: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<Task> {
        self.run_blocking(move |connection| {
            connection.transaction(|conn| {
                let mut task = lock_task(conn, task_id)?;
                let mut builder = lock_builder(conn, builder_id)?;

                apply_assignment(&mut task, &mut builder, live_since, at)?;

                save_task(conn, &task)?;
                save_builder(conn, &builder)?;
                Ok(task)
            })
        })
        .await
    }

    async fn record_heartbeat(
        &self,
        builder_id: BuilderId,
        reported_idle: bool,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<HeartbeatRecord> {
        self.run_blocking(move |connection| {
            connection.transaction(|conn| {
                let mut builder = lock_builder(conn, builder_id)?;
                let delivered = match builder.record_heartbeat(reported_idle, at) {
                    Some(task_id) => {
                        let row = tasks::table
                            .find(task_id.into_inner())
                            .select(TaskRow::as_select())
                            .first::<TaskRow>(conn)
                            .optional()?;
                        let task = convert_row::<_, Task, DispatchStoreError>(row)?
                            .ok_or(DispatchStoreError::TaskNotFound(task_id))?;
                        Some(task)
                    }
                    None => None,
                };

                save_builder(conn, &builder)?;
                Ok(HeartbeatRecord { builder, delivered })
            })
        })
        .await
    }

    async fn begin_upload(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<TransitionOutcome> {
        self.run_blocking(move |connection| {
            connection.transaction(|conn| {
                let mut task = lock_task(conn, task_id)?;
                let builder = lock_builder(conn, builder_id)?;

                match apply_upload(&mut task, &builder, at)? {
                    TransitionEffect::Unchanged => Ok(TransitionOutcome::AlreadyApplied(task)),
                    TransitionEffect::Applied => {
                        save_task(conn, &task)?;
                        Ok(TransitionOutcome::Applied(task))
                    }
                }
            })
        })
        .await
    }

    async fn release(
        &self,
        task_id: TaskId,
        builder_id: BuilderId,
        outcome: BuildOutcome,
        at: DateTime<Utc>,
    ) -> DispatchStoreResult<TransitionOutcome> {
        self.run_blocking(move |connection| {
            connection.transaction(|conn| {
                let mut task = lock_task(conn, task_id)?;
                let mut builder = lock_builder(conn, builder_id)?;

                match apply_release(&mut task, &mut builder, outcome, at)? {
                    TransitionEffect::Unchanged => Ok(TransitionOutcome::AlreadyApplied(task)),
                    TransitionEffect::Applied => {
                        save_task(conn, &task)?;
                        save_builder(conn, &builder)?;
                        Ok(TransitionOutcome::Applied(task))
                    }
                }
            })
        })
        .await
    }
}

//! Task repository queries.

use super::{
    PostgresStore, convert_row, convert_rows,
    models::{NewTaskRow, TaskRow, tags_to_value},
    schema::tasks,
};
use crate::builder::domain::BuilderId;
use crate::task::{
    domain::{Task, TaskId, TaskStatus},
    ports::{TaskInsertion, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Statuses that never block a new equivalent task.
const NON_REUSABLE_STATUSES: [&str; 2] = [
    TaskStatus::Failed.as_str(),
    TaskStatus::Archived.as_str(),
];

fn insert_task(
    connection: &mut PgConnection,
    task_id: TaskId,
    new_row: &NewTaskRow,
) -> TaskRepositoryResult<()> {
    diesel::insert_into(tasks::table)
        .values(new_row)
        .execute(connection)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                TaskRepositoryError::DuplicateTask(task_id)
            }
            _ => TaskRepositoryError::persistence(err),
        })?;
    Ok(())
}

#[async_trait]
impl TaskRepository for PostgresStore {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let new_row = NewTaskRow::from(task);
        self.run_blocking(move |connection| insert_task(connection, task_id, &new_row))
            .await
    }

    async fn store_or_reuse(&self, task: &Task) -> TaskRepositoryResult<TaskInsertion> {
        let task_id = task.id();
        let new_row = NewTaskRow::from(task);
        let tags = tags_to_value(task.requirements().tags());

        self.run_blocking(move |connection| {
            connection
                .build_transaction()
                .serializable()
                .run(|conn| {
                    let existing = tasks::table
                        .filter(tasks::os.eq(&new_row.os))
                        .filter(tasks::arch.eq(&new_row.arch))
                        .filter(tasks::tags.eq(&tags))
                        .filter(tasks::commit_id.eq(&new_row.commit_id))
                        .filter(tasks::status.ne_all(NON_REUSABLE_STATUSES))
                        .order((tasks::created_at.asc(), tasks::id.asc()))
                        .select(TaskRow::as_select())
                        .first::<TaskRow>(conn)
                        .optional()?;
                    if let Some(found) = convert_row::<_, Task, TaskRepositoryError>(existing)? {
                        return Ok(TaskInsertion::Reused(found));
                    }

                    insert_task(conn, task_id, &new_row)?;
                    Ok(TaskInsertion::Stored)
                })
        })
        .await
    }

    async fn update_status(&self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let status = task.status().as_str();
        let assigned_builder = task.assigned_builder().map(BuilderId::into_inner);
        let last_builder = task.last_builder().map(BuilderId::into_inner);
        let updated_at = task.updated_at();

        self.run_blocking(move |connection| {
            let updated = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task_id.into_inner()))
                    .filter(tasks::status.eq(expected.as_str())),
            )
            .set((
                tasks::status.eq(status),
                tasks::assigned_builder_id.eq(assigned_builder),
                tasks::last_builder_id.eq(last_builder),
                tasks::updated_at.eq(updated_at),
            ))
            .execute(connection)?;
            if updated > 0 {
                return Ok(());
            }

            let current = tasks::table
                .find(task_id.into_inner())
                .select(tasks::status)
                .first::<String>(connection)
                .optional()?
                .ok_or(TaskRepositoryError::NotFound(task_id))?;
            let found = TaskStatus::try_from(current.as_str())
                .map_err(TaskRepositoryError::invalid_persisted_data)?;
            Err(TaskRepositoryError::StatusConflict {
                task_id,
                expected,
                found,
            })
        })
        .await
    }

    async fn find_task(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .find(id.into_inner())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            convert_row(row)
        })
        .await
    }

    async fn list_pending(&self) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::status.eq(TaskStatus::Pending.as_str()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            convert_rows(rows)
        })
        .await
    }

    async fn list_recent(&self, offset: usize, limit: usize) -> TaskRepositoryResult<Vec<Task>> {
        let page_offset = i64::try_from(offset).map_err(TaskRepositoryError::persistence)?;
        let page_limit = i64::try_from(limit).map_err(TaskRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .order((tasks::created_at.desc(), tasks::id.desc()))
                .offset(page_offset)
                .limit(page_limit)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)?;
            convert_rows(rows)
        })
        .await
    }
}

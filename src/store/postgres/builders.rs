//! Builder repository queries.

use super::{
    PostgresStore, convert_row, convert_rows,
    models::{BuilderRow, NewBuilderRow},
    schema::{builder_capabilities, builders},
};
use crate::builder::{
    domain::{Builder, BuilderId, BuilderName, TokenDigest},
    ports::{BuilderRepository, BuilderRepositoryError, BuilderRepositoryResult},
};
use crate::task::domain::TaskId;
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

fn is_name_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == "idx_builders_name_unique")
}

fn load_builder(
    connection: &mut PgConnection,
    id: BuilderId,
) -> BuilderRepositoryResult<Option<Builder>> {
    let row = builders::table
        .find(id.into_inner())
        .select(BuilderRow::as_select())
        .first::<BuilderRow>(connection)
        .optional()?;
    convert_row(row)
}

#[async_trait]
impl BuilderRepository for PostgresStore {
    async fn register(&self, builder: &Builder) -> BuilderRepositoryResult<()> {
        let builder_id = builder.id();
        let name = builder.name().clone();
        let new_row = NewBuilderRow::from(builder);

        self.run_blocking(move |connection| {
            diesel::insert_into(builders::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_name_violation(info.as_ref()) =>
                    {
                        BuilderRepositoryError::DuplicateBuilderName(name.clone())
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        BuilderRepositoryError::DuplicateBuilder(builder_id)
                    }
                    _ => BuilderRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_profile(&self, builder: &Builder) -> BuilderRepositoryResult<()> {
        let builder_id = builder.id();
        let name = builder.name().clone();
        let token_digest = builder.token_digest().as_str().to_owned();
        let trust_level = builder.trust_level().as_str();
        let updated_at = builder.updated_at();

        self.run_blocking(move |connection| {
            let updated = diesel::update(builders::table.find(builder_id.into_inner()))
                .set((
                    builders::name.eq(name.as_str()),
                    builders::token_digest.eq(&token_digest),
                    builders::trust_level.eq(trust_level),
                    builders::updated_at.eq(updated_at),
                ))
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_name_violation(info.as_ref()) =>
                    {
                        BuilderRepositoryError::DuplicateBuilderName(name.clone())
                    }
                    _ => BuilderRepositoryError::persistence(err),
                })?;
            if updated == 0 {
                return Err(BuilderRepositoryError::NotFound(builder_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_builder(&self, id: BuilderId) -> BuilderRepositoryResult<Option<Builder>> {
        self.run_blocking(move |connection| load_builder(connection, id))
            .await
    }

    async fn find_by_token(&self, digest: &TokenDigest) -> BuilderRepositoryResult<Option<Builder>> {
        let lookup = digest.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = builders::table
                .filter(builders::token_digest.eq(&lookup))
                .select(BuilderRow::as_select())
                .first::<BuilderRow>(connection)
                .optional()?;
            convert_row(row)
        })
        .await
    }

    async fn find_by_name(&self, name: &BuilderName) -> BuilderRepositoryResult<Option<Builder>> {
        let lookup = name.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = builders::table
                .filter(builders::name.eq(&lookup))
                .select(BuilderRow::as_select())
                .first::<BuilderRow>(connection)
                .optional()?;
            convert_row(row)
        })
        .await
    }

    async fn list_builders(&self) -> BuilderRepositoryResult<Vec<Builder>> {
        self.run_blocking(move |connection| {
            let rows = builders::table
                .order((builders::created_at.asc(), builders::id.asc()))
                .select(BuilderRow::as_select())
                .load::<BuilderRow>(connection)?;
            convert_rows(rows)
        })
        .await
    }

    async fn delete_builder(&self, id: BuilderId) -> BuilderRepositoryResult<()> {
        self.run_blocking(move |connection| {
            connection.transaction(|conn| {
                let held = builders::table
                    .find(id.into_inner())
                    .select(builders::assigned_task_id)
                    .for_update()
                    .first::<Option<uuid::Uuid>>(conn)
                    .optional()?
                    .ok_or(BuilderRepositoryError::NotFound(id))?;
                if let Some(task_id) = held {
                    return Err(BuilderRepositoryError::Busy {
                        builder_id: id,
                        task_id: TaskId::from_uuid(task_id),
                    });
                }

                diesel::delete(
                    builder_capabilities::table
                        .filter(builder_capabilities::builder_id.eq(id.into_inner())),
                )
                .execute(conn)?;
                diesel::delete(builders::table.find(id.into_inner())).execute(conn)?;
                Ok(())
            })
        })
        .await
    }
}

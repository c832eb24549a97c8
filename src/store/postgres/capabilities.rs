//! Capability repository queries.

use super::{
    PostgresStore, convert_rows,
    models::{CapabilityRow, NewCapabilityRow},
    schema::{builder_capabilities, builders},
};
use crate::builder::domain::BuilderId;
use crate::matrix::{
    domain::{CapabilityEntry, Platform},
    ports::{CapabilityRepository, CapabilityRepositoryError, CapabilityRepositoryResult},
};
use async_trait::async_trait;
use diesel::prelude::*;

#[async_trait]
impl CapabilityRepository for PostgresStore {
    async fn replace_capabilities(
        &self,
        builder_id: BuilderId,
        entries: &[CapabilityEntry],
    ) -> CapabilityRepositoryResult<()> {
        if let Some(foreign) = entries.iter().find(|entry| entry.builder_id() != builder_id) {
            return Err(CapabilityRepositoryError::ForeignEntry {
                expected: builder_id,
                found: foreign.builder_id(),
            });
        }
        let new_rows: Vec<NewCapabilityRow> = entries.iter().map(NewCapabilityRow::from).collect();

        self.run_blocking(move |connection| {
            connection.transaction(|conn| {
                builders::table
                    .find(builder_id.into_inner())
                    .select(builders::id)
                    .for_update()
                    .first::<uuid::Uuid>(conn)
                    .optional()?
                    .ok_or(CapabilityRepositoryError::BuilderNotFound(builder_id))?;

                diesel::delete(
                    builder_capabilities::table
                        .filter(builder_capabilities::builder_id.eq(builder_id.into_inner())),
                )
                .execute(conn)?;
                if !new_rows.is_empty() {
                    diesel::insert_into(builder_capabilities::table)
                        .values(&new_rows)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn capabilities_of(
        &self,
        builder_id: BuilderId,
    ) -> CapabilityRepositoryResult<Vec<CapabilityEntry>> {
        self.run_blocking(move |connection| {
            let rows = builder_capabilities::table
                .filter(builder_capabilities::builder_id.eq(builder_id.into_inner()))
                .order(builder_capabilities::id.asc())
                .select(CapabilityRow::as_select())
                .load::<CapabilityRow>(connection)?;
            convert_rows(rows)
        })
        .await
    }

    async fn entries_for_platform(
        &self,
        platform: &Platform,
    ) -> CapabilityRepositoryResult<Vec<CapabilityEntry>> {
        let os = platform.os().to_owned();
        let arch = platform.arch().to_owned();
        self.run_blocking(move |connection| {
            let rows = builder_capabilities::table
                .filter(builder_capabilities::os.eq(&os))
                .filter(builder_capabilities::arch.eq(&arch))
                .order((
                    builder_capabilities::builder_id.asc(),
                    builder_capabilities::id.asc(),
                ))
                .select(CapabilityRow::as_select())
                .load::<CapabilityRow>(connection)?;
            convert_rows(rows)
        })
        .await
    }
}

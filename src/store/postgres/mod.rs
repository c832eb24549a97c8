//! `PostgreSQL` store built on Diesel and an r2d2 connection pool.

mod builders;
mod capabilities;
mod dispatch;
mod models;
mod schema;
mod tasks;

use crate::builder::ports::BuilderRepositoryError;
use crate::dispatch::ports::DispatchStoreError;
use crate::matrix::ports::CapabilityRepositoryError;
use crate::task::ports::TaskRepositoryError;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;
use models::ConversionError;
use std::error::Error as StdError;
use std::sync::Arc;

/// `PostgreSQL` connection pool type used by the store.
pub type CoordinatorPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed store implementing every repository port.
///
/// Dispatch writes lock the task row before the builder row, and run in one
/// transaction each.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: CoordinatorPgPool,
}

impl PostgresStore {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: CoordinatorPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: StoreFailure + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(E::from_store)?;
            f(&mut connection)
        })
        .await
        .map_err(E::from_store)?
    }
}

/// Port errors the store can raise for infrastructure and row failures.
trait StoreFailure: Sized {
    fn from_store(err: impl StdError + Send + Sync + 'static) -> Self;

    fn from_row(err: ConversionError) -> Self;
}

impl StoreFailure for BuilderRepositoryError {
    fn from_store(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }

    fn from_row(err: ConversionError) -> Self {
        Self::InvalidPersistedData(Arc::from(err))
    }
}

impl StoreFailure for CapabilityRepositoryError {
    fn from_store(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }

    fn from_row(err: ConversionError) -> Self {
        Self::InvalidPersistedData(Arc::from(err))
    }
}

impl StoreFailure for TaskRepositoryError {
    fn from_store(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }

    fn from_row(err: ConversionError) -> Self {
        Self::InvalidPersistedData(Arc::from(err))
    }
}

impl StoreFailure for DispatchStoreError {
    fn from_store(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::persistence(err)
    }

    fn from_row(err: ConversionError) -> Self {
        Self::InvalidPersistedData(Arc::from(err))
    }
}

impl From<DieselError> for BuilderRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

impl From<DieselError> for CapabilityRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

impl From<DieselError> for TaskRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

impl From<DieselError> for DispatchStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// Converts optional query rows into domain values.
fn convert_row<R, D, E>(row: Option<R>) -> Result<Option<D>, E>
where
    D: TryFrom<R, Error = ConversionError>,
    E: StoreFailure,
{
    row.map(D::try_from).transpose().map_err(E::from_row)
}

/// Converts query rows into domain values.
fn convert_rows<R, D, E>(rows: Vec<R>) -> Result<Vec<D>, E>
where
    D: TryFrom<R, Error = ConversionError>,
    E: StoreFailure,
{
    rows.into_iter()
        .map(D::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(E::from_row)
}

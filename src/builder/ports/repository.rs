//! Repository port for builder registration persistence and lookup.

use crate::builder::domain::{Builder, BuilderId, BuilderName, TokenDigest};
use crate::task::domain::TaskId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for builder repository operations.
pub type BuilderRepositoryResult<T> = Result<T, BuilderRepositoryError>;

/// Builder persistence contract.
///
/// Liveness and assignment fields are written only through
/// [`crate::dispatch::ports::DispatchStore`]; the profile update here never
/// touches them.
#[async_trait]
pub trait BuilderRepository: Send + Sync {
    /// Stores a newly registered builder.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRepositoryError::DuplicateBuilder`] when the builder
    /// ID already exists or [`BuilderRepositoryError::DuplicateBuilderName`]
    /// when the name is already taken.
    async fn register(&self, builder: &Builder) -> BuilderRepositoryResult<()>;

    /// Persists the name, trust level, token digest and `updated_at` of an
    /// existing builder.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRepositoryError::NotFound`] when the builder does not
    /// exist or [`BuilderRepositoryError::DuplicateBuilderName`] when the new
    /// name belongs to another builder.
    async fn update_profile(&self, builder: &Builder) -> BuilderRepositoryResult<()>;

    /// Finds a builder by identifier.
    async fn find_builder(&self, id: BuilderId) -> BuilderRepositoryResult<Option<Builder>>;

    /// Finds a builder by the digest of its token.
    async fn find_by_token(&self, digest: &TokenDigest) -> BuilderRepositoryResult<Option<Builder>>;

    /// Finds a builder by unique name.
    async fn find_by_name(&self, name: &BuilderName) -> BuilderRepositoryResult<Option<Builder>>;

    /// Returns every builder, oldest registration first.
    async fn list_builders(&self) -> BuilderRepositoryResult<Vec<Builder>>;

    /// Deletes a builder together with its capability entries.
    ///
    /// Task records keep the builder identifier as history.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderRepositoryError::NotFound`] when the builder does not
    /// exist or [`BuilderRepositoryError::Busy`] while it holds a task.
    async fn delete_builder(&self, id: BuilderId) -> BuilderRepositoryResult<()>;
}

/// Errors returned by builder repository implementations.
#[derive(Debug, Clone, Error)]
pub enum BuilderRepositoryError {
    /// A builder with the same identifier already exists.
    #[error("duplicate builder identifier: {0}")]
    DuplicateBuilder(BuilderId),

    /// A builder with the same name already exists.
    #[error("duplicate builder name: {0}")]
    DuplicateBuilderName(BuilderName),

    /// The builder was not found.
    #[error("builder not found: {0}")]
    NotFound(BuilderId),

    /// The builder holds a task and cannot be deleted.
    #[error("builder {builder_id} is busy with task {task_id}")]
    Busy {
        /// Builder targeted by the deletion.
        builder_id: BuilderId,
        /// Task the builder holds.
        task_id: TaskId,
    },

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl BuilderRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

//! Repository port for builder capability entries.

use crate::builder::domain::BuilderId;
use crate::matrix::domain::{CapabilityEntry, Platform};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for capability repository operations.
pub type CapabilityRepositoryResult<T> = Result<T, CapabilityRepositoryError>;

/// Capability persistence contract.
#[async_trait]
pub trait CapabilityRepository: Send + Sync {
    /// Replaces every entry of `builder_id` with `entries` in one
    /// transaction.
    ///
    /// Readers observe either the complete old set or the complete new set.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityRepositoryError::BuilderNotFound`] when the builder
    /// does not exist, or [`CapabilityRepositoryError::ForeignEntry`] when an
    /// entry belongs to another builder.
    async fn replace_capabilities(
        &self,
        builder_id: BuilderId,
        entries: &[CapabilityEntry],
    ) -> CapabilityRepositoryResult<()>;

    /// Returns the current entries of a builder.
    async fn capabilities_of(
        &self,
        builder_id: BuilderId,
    ) -> CapabilityRepositoryResult<Vec<CapabilityEntry>>;

    /// Returns every entry, across all builders, for an exact platform.
    async fn entries_for_platform(
        &self,
        platform: &Platform,
    ) -> CapabilityRepositoryResult<Vec<CapabilityEntry>>;
}

/// Errors returned by capability repository implementations.
#[derive(Debug, Clone, Error)]
pub enum CapabilityRepositoryError {
    /// The builder owning the entries was not found.
    #[error("builder not found: {0}")]
    BuilderNotFound(BuilderId),

    /// An entry in a replacement set belongs to a different builder.
    #[error("capability entry for builder {found} submitted for builder {expected}")]
    ForeignEntry {
        /// Builder whose entries are being replaced.
        expected: BuilderId,
        /// Builder named by the offending entry.
        found: BuilderId,
    },

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CapabilityRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

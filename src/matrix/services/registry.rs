//! Service layer for the builder capability matrix.

use super::match_entries;
use crate::builder::domain::BuilderId;
use crate::matrix::{
    domain::{CapabilityDeclaration, CapabilityEntry, MatrixDomainError, Platform, TagSet},
    ports::{CapabilityRepository, CapabilityRepositoryError},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Service-level errors for capability operations.
#[derive(Debug, Error)]
pub enum CapabilityRegistryError {
    /// A declaration failed validation.
    #[error(transparent)]
    Domain(#[from] MatrixDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] CapabilityRepositoryError),
    /// No builder has ever declared the requested platform.
    #[error("no builder declares {platform} (tags: [{tags}])")]
    NoSuitableCapability {
        /// Requested platform.
        platform: Platform,
        /// Requested tags.
        tags: TagSet,
    },
}

/// Result type for capability registry operations.
pub type CapabilityRegistryResult<T> = Result<T, CapabilityRegistryError>;

/// Holder of every builder's capability entries.
pub struct CapabilityRegistry<R>
where
    R: CapabilityRepository,
{
    repository: Arc<R>,
}

impl<R> Clone for CapabilityRegistry<R>
where
    R: CapabilityRepository,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R> CapabilityRegistry<R>
where
    R: CapabilityRepository,
{
    /// Creates a registry over the given repository.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Replaces a builder's whole capability set from its wire declarations.
    ///
    /// Validation happens before any write, so an invalid payload leaves the
    /// previous set untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityRegistryError::Domain`] for invalid declarations
    /// and [`CapabilityRegistryError::Repository`] when the replacement
    /// cannot be stored.
    pub async fn replace_capabilities(
        &self,
        builder_id: BuilderId,
        declarations: Vec<CapabilityDeclaration>,
    ) -> CapabilityRegistryResult<Vec<CapabilityEntry>> {
        let entries = CapabilityDeclaration::expand_all(declarations, builder_id)?;
        self.repository
            .replace_capabilities(builder_id, &entries)
            .await?;
        info!(
            builder_id = %builder_id,
            entries = entries.len(),
            "builder capabilities replaced"
        );
        Ok(entries)
    }

    /// Returns a builder's current entries.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityRegistryError::Repository`] when lookup fails.
    pub async fn capabilities_of(
        &self,
        builder_id: BuilderId,
    ) -> CapabilityRegistryResult<Vec<CapabilityEntry>> {
        Ok(self.repository.capabilities_of(builder_id).await?)
    }

    /// Returns the builders with an entry serving `platform` with `tags`.
    ///
    /// Matching is [`match_entries`], so each builder appears once even when
    /// several of its entries qualify.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityRegistryError::NoSuitableCapability`] when no
    /// entry exists for `platform` at all, regardless of tags.
    pub async fn find_candidate_builders(
        &self,
        platform: &Platform,
        tags: &TagSet,
    ) -> CapabilityRegistryResult<Vec<BuilderId>> {
        let entries = self.repository.entries_for_platform(platform).await?;
        if entries.is_empty() {
            return Err(CapabilityRegistryError::NoSuitableCapability {
                platform: platform.clone(),
                tags: tags.clone(),
            });
        }
        Ok(match_entries(&entries, platform, tags))
    }
}

//! Candidate builder matching.

use super::{CapabilityRegistry, CapabilityRegistryResult};
use crate::builder::domain::BuilderId;
use crate::matrix::{
    domain::{CapabilityEntry, Platform, TagSet},
    ports::CapabilityRepository,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Returns the builders owning an entry that satisfies `platform` and
/// `tags`, deduplicated and in ascending identifier order.
#[must_use]
pub fn match_entries(entries: &[CapabilityEntry], platform: &Platform, tags: &TagSet) -> Vec<BuilderId> {
    entries
        .iter()
        .filter(|entry| entry.satisfies(platform, tags))
        .map(CapabilityEntry::builder_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Turns task requirements into an ordered candidate builder list.
pub struct MatchEngine<R>
where
    R: CapabilityRepository,
{
    registry: CapabilityRegistry<R>,
}

impl<R> Clone for MatchEngine<R>
where
    R: CapabilityRepository,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<R> MatchEngine<R>
where
    R: CapabilityRepository,
{
    /// Creates a match engine reading from `repository`.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self {
            registry: CapabilityRegistry::new(repository),
        }
    }

    /// Returns each builder able to run the requirements exactly once, in
    /// ascending identifier order.
    ///
    /// An empty list means the platform is known but no builder offers all
    /// requested tags.
    ///
    /// # Errors
    ///
    /// Returns [`super::CapabilityRegistryError::NoSuitableCapability`] when
    /// no builder declares the platform.
    pub async fn candidates(
        &self,
        platform: &Platform,
        tags: &TagSet,
    ) -> CapabilityRegistryResult<Vec<BuilderId>> {
        self.registry.find_candidate_builders(platform, tags).await
    }
}

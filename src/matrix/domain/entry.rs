//! A single row of a builder's capability matrix.

use super::{Platform, TagSet};
use crate::builder::domain::BuilderId;
use serde::{Deserialize, Serialize};

/// One platform and tag set a builder can serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityEntry {
    builder_id: BuilderId,
    platform: Platform,
    tags: TagSet,
}

impl CapabilityEntry {
    /// Creates a capability entry.
    #[must_use]
    pub const fn new(builder_id: BuilderId, platform: Platform, tags: TagSet) -> Self {
        Self {
            builder_id,
            platform,
            tags,
        }
    }

    /// Returns the owning builder.
    #[must_use]
    pub const fn builder_id(&self) -> BuilderId {
        self.builder_id
    }

    /// Returns the platform served.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Returns the tags offered.
    #[must_use]
    pub const fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns whether this entry can serve `platform` with `tags`.
    ///
    /// The platform must match exactly; extra tags on the entry are ignored.
    #[must_use]
    pub fn satisfies(&self, platform: &Platform, tags: &TagSet) -> bool {
        self.platform == *platform && tags.is_subset_of(&self.tags)
    }
}

//! What a task needs from the builder that runs it.

use super::TaskDomainError;
use crate::matrix::domain::{Platform, TagSet};
use serde::{Deserialize, Serialize};

/// Platform and tags a builder must offer to run a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRequirements {
    platform: Platform,
    tags: TagSet,
}

impl TaskRequirements {
    /// Creates requirements from validated parts.
    #[must_use]
    pub const fn new(platform: Platform, tags: TagSet) -> Self {
        Self { platform, tags }
    }

    /// Parses requirements from raw request fields.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Requirements`] when the platform or a tag
    /// is invalid.
    pub fn parse<I, S>(
        os: impl Into<String>,
        arch: impl Into<String>,
        tags: I,
    ) -> Result<Self, TaskDomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            platform: Platform::new(os, arch)?,
            tags: TagSet::new(tags)?,
        })
    }

    /// Returns the requested platform.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Returns the requested tags.
    #[must_use]
    pub const fn tags(&self) -> &TagSet {
        &self.tags
    }
}

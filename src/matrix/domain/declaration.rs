//! Wire-level capability declarations sent by builders.

use super::{CapabilityEntry, MatrixDomainError, Platform, TagSet};
use crate::builder::domain::BuilderId;
use serde::{Deserialize, Serialize};

/// Capability declaration in the builder update payload.
///
/// A builder submits its whole capability set as a JSON array of these
/// objects, for example
/// `[{"os": "linux", "archs": ["amd64", "arm64"], "tags": ["cgo"]}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDeclaration {
    /// Operating system served.
    pub os: String,
    /// Architectures served for that operating system.
    pub archs: Vec<String>,
    /// Tags offered on every listed architecture.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CapabilityDeclaration {
    /// Creates a declaration.
    #[must_use]
    pub fn new<A, T>(os: impl Into<String>, archs: A, tags: T) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            os: os.into(),
            archs: archs.into_iter().map(Into::into).collect(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Expands the declaration into one entry per architecture.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixDomainError::NoArchitectures`] when `archs` is empty,
    /// or any platform or tag validation error.
    pub fn into_entries(
        self,
        builder_id: BuilderId,
    ) -> Result<Vec<CapabilityEntry>, MatrixDomainError> {
        if self.archs.is_empty() {
            return Err(MatrixDomainError::NoArchitectures(self.os));
        }
        let tags = TagSet::new(self.tags)?;
        self.archs
            .into_iter()
            .map(|arch| {
                let platform = Platform::new(self.os.as_str(), arch)?;
                Ok(CapabilityEntry::new(builder_id, platform, tags.clone()))
            })
            .collect()
    }

    /// Expands a whole payload, dropping duplicate entries.
    ///
    /// # Errors
    ///
    /// Returns the first validation error encountered.
    pub fn expand_all(
        declarations: Vec<Self>,
        builder_id: BuilderId,
    ) -> Result<Vec<CapabilityEntry>, MatrixDomainError> {
        let mut entries: Vec<CapabilityEntry> = Vec::new();
        for declaration in declarations {
            for entry in declaration.into_entries(builder_id)? {
                if !entries.contains(&entry) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }
}

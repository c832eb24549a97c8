//! Artifact output formats.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Archive format a build is packed into, such as `zip` or `tar.gz`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactFormat(String);

impl ArtifactFormat {
    /// Creates a validated format.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidArtifactFormat`] unless the trimmed
    /// value is non-empty, made of ASCII alphanumerics and `.`, and does not
    /// start or end with `.`.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        let is_valid = !normalized.is_empty()
            && !normalized.starts_with('.')
            && !normalized.ends_with('.')
            && normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.');
        if !is_valid {
            return Err(TaskDomainError::InvalidArtifactFormat(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the format as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

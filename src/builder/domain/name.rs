//! Validated builder display name.

use super::BuilderDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a builder name, matching the `VARCHAR(100)` column.
const MAX_NAME_LENGTH: usize = 100;

/// Unique, human-readable builder name such as `linux-amd64-01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuilderName(String);

impl BuilderName {
    /// Creates a validated builder name.
    ///
    /// The input is trimmed but keeps its case. Only ASCII alphanumerics,
    /// `.`, `_` and `-` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderDomainError::EmptyBuilderName`] when the value is empty
    /// after trimming, [`BuilderDomainError::BuilderNameTooLong`] when it
    /// exceeds 100 characters, or [`BuilderDomainError::InvalidBuilderName`]
    /// when it contains other characters.
    pub fn new(value: impl Into<String>) -> Result<Self, BuilderDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        if normalized.is_empty() {
            return Err(BuilderDomainError::EmptyBuilderName);
        }

        if normalized.len() > MAX_NAME_LENGTH {
            return Err(BuilderDomainError::BuilderNameTooLong(raw));
        }

        let is_valid = normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !is_valid {
            return Err(BuilderDomainError::InvalidBuilderName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the builder name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BuilderName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BuilderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Source control value objects: branch names and resolved commits.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a validated branch name.
const MAX_BRANCH_NAME_LENGTH: usize = 255;

/// Number of commit characters used in artifact names.
const SHORT_COMMIT_LENGTH: usize = 10;

/// Validated Git branch name.
///
/// Branch names must be non-empty after trimming, must not start with `-`
/// or contain whitespace, and must not exceed `MAX_BRANCH_NAME_LENGTH`
/// characters. The leading-dash rule keeps names from being read as options
/// when passed to `git`.
///
/// # Examples
///
///     use kiln::task::domain::BranchName;
///
///     let name = BranchName::new("release/1.2").expect("valid");
///     assert_eq!(name.as_str(), "release/1.2");
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a validated branch name.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidBranchName`] when the value is empty,
    /// starts with `-`, contains whitespace, or exceeds the length limit.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim();

        let is_invalid = normalized.is_empty()
            || normalized.starts_with('-')
            || normalized.chars().any(char::is_whitespace)
            || normalized.len() > MAX_BRANCH_NAME_LENGTH;
        if is_invalid {
            return Err(TaskDomainError::InvalidBranchName(raw));
        }

        Ok(Self(normalized.to_owned()))
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full commit hash: 40 hex characters for SHA-1 repositories, 64 for
/// SHA-256 ones. Stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Creates a validated commit identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCommitId`] unless the trimmed value
    /// is 40 or 64 hexadecimal characters.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_lowercase();

        let has_valid_length = matches!(normalized.len(), 40 | 64);
        if !has_valid_length || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TaskDomainError::InvalidCommitId(raw));
        }

        Ok(Self(normalized))
    }

    /// Returns the full hash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the abbreviated hash used in artifact names.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..SHORT_COMMIT_LENGTH).unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

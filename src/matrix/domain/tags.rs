//! Tag sets attached to capabilities and task requirements.

use super::MatrixDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Set of case-sensitive tags such as `cgo` or `static`.
///
/// Order and repetition in the input are irrelevant. Serialises as a sorted
/// JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Builds a validated tag set.
    ///
    /// Each tag is trimmed; duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixDomainError::EmptyTag`] for blank tags and
    /// [`MatrixDomainError::InvalidTag`] for tags containing whitespace or
    /// `,`.
    pub fn new<I, S>(tags: I) -> Result<Self, MatrixDomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for tag in tags {
            let raw = tag.into();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(MatrixDomainError::EmptyTag);
            }
            if trimmed.chars().any(|c| c.is_whitespace() || c == ',') {
                return Err(MatrixDomainError::InvalidTag(raw));
            }
            set.insert(trimmed.to_owned());
        }
        Ok(Self(set))
    }

    /// Returns an empty tag set, which every capability satisfies.
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns whether every tag in `self` also appears in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns whether the set contains `tag`.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the set has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the tags as a sorted vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

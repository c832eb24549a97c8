//! Builder trust levels.

use super::ParseTrustLevelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far operators trust the artifacts a builder produces.
///
/// Recorded for presentation and auditing; matching ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Registered but not yet vetted by an operator.
    Unapproved,
    /// Vetted by an operator.
    #[default]
    Approved,
    /// Run by the project itself.
    Official,
}

impl TrustLevel {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unapproved => "unapproved",
            Self::Approved => "approved",
            Self::Official => "official",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TrustLevel {
    type Error = ParseTrustLevelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unapproved" => Ok(Self::Unapproved),
            "approved" => Ok(Self::Approved),
            "official" => Ok(Self::Official),
            _ => Err(ParseTrustLevelError(value.to_owned())),
        }
    }
}

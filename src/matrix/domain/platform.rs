//! Operating system and architecture pair.

use super::MatrixDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system and CPU architecture, compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Creates a validated platform such as `linux`/`amd64`.
    ///
    /// Components are trimmed but keep their case.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixDomainError::EmptyOs`] or
    /// [`MatrixDomainError::EmptyArch`] for blank components and
    /// [`MatrixDomainError::InvalidPlatformComponent`] when a component
    /// contains whitespace, `/` or `,`.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Result<Self, MatrixDomainError> {
        Ok(Self {
            os: normalize_component(os.into(), MatrixDomainError::EmptyOs)?,
            arch: normalize_component(arch.into(), MatrixDomainError::EmptyArch)?,
        })
    }

    /// Returns the operating system.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Returns the architecture.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn normalize_component(raw: String, empty: MatrixDomainError) -> Result<String, MatrixDomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(empty);
    }
    let is_valid = !trimmed
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | ','));
    if !is_valid {
        return Err(MatrixDomainError::InvalidPlatformComponent(raw));
    }
    Ok(trimmed.to_owned())
}

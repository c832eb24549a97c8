//! Error types for capability matrix validation.

use thiserror::Error;

/// Errors returned while constructing capability values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatrixDomainError {
    /// The operating system is empty after trimming.
    #[error("operating system must not be empty")]
    EmptyOs,

    /// The architecture is empty after trimming.
    #[error("architecture must not be empty")]
    EmptyArch,

    /// A platform component contains whitespace, `/` or `,`.
    #[error("invalid platform component '{0}'")]
    InvalidPlatformComponent(String),

    /// A tag is empty after trimming.
    #[error("tags must not be empty")]
    EmptyTag,

    /// A tag contains whitespace or `,`.
    #[error("invalid tag '{0}'")]
    InvalidTag(String),

    /// A capability declaration lists no architectures.
    #[error("capability declaration for '{0}' lists no architectures")]
    NoArchitectures(String),
}

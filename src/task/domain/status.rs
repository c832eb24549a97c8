//! Task status state machine.

use super::ParseTaskStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
///
/// ```text
/// pending -> building -> uploading -> failed | succeeded -> archived
///                     \-> failed | succeeded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a builder.
    Pending,
    /// Assigned to a builder that is building it.
    Building,
    /// The builder is uploading artifacts.
    Uploading,
    /// The build failed.
    Failed,
    /// The build succeeded.
    Succeeded,
    /// Retired by an operator; artifacts have been removed.
    Archived,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::Uploading => "uploading",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
            Self::Archived => "archived",
        }
    }

    /// Returns whether `self -> target` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Building)
                | (Self::Building, Self::Uploading | Self::Failed | Self::Succeeded)
                | (Self::Uploading, Self::Failed | Self::Succeeded)
                | (Self::Failed | Self::Succeeded, Self::Archived)
        )
    }

    /// Returns whether the task can never be assigned again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Succeeded | Self::Archived)
    }

    /// Returns whether a task in this status holds a builder.
    #[must_use]
    pub const fn holds_builder(self) -> bool {
        matches!(self, Self::Building | Self::Uploading)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "building" => Ok(Self::Building),
            "uploading" => Ok(Self::Uploading),
            "failed" => Ok(Self::Failed),
            "succeeded" => Ok(Self::Succeeded),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// Final result a builder reports for its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    /// The build failed.
    Failed,
    /// The build succeeded.
    Succeeded,
}

impl BuildOutcome {
    /// Returns the status this outcome moves the task to.
    #[must_use]
    pub const fn status(self) -> TaskStatus {
        match self {
            Self::Failed => TaskStatus::Failed,
            Self::Succeeded => TaskStatus::Succeeded,
        }
    }
}

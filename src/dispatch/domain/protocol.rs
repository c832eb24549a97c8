//! Builder-facing heartbeat wire contract.

use crate::config::ProjectConfig;
use crate::task::domain::{Task, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Status code a builder sends with each heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireStatus {
    /// Ready for work.
    Idle,
    /// Working on the assigned task.
    Building,
    /// Uploading artifacts for the assigned task.
    Uploading,
    /// The assigned task failed.
    Failed,
    /// The assigned task succeeded.
    Succeeded,
}

impl WireStatus {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Building => "BUILDING",
            Self::Uploading => "UPLOADING",
            Self::Failed => "FAILED",
            Self::Succeeded => "SUCCEEDED",
        }
    }

    /// Returns whether the builder reports itself ready for work.
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for WireStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for WireStatus {
    type Error = ParseWireStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "IDLE" => Ok(Self::Idle),
            "BUILDING" => Ok(Self::Building),
            "UPLOADING" => Ok(Self::Uploading),
            "FAILED" => Ok(Self::Failed),
            "SUCCEEDED" => Ok(Self::Succeeded),
            _ => Err(ParseWireStatusError(value.to_owned())),
        }
    }
}

/// Error returned while parsing a heartbeat status code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown heartbeat status: {0}")]
pub struct ParseWireStatusError(pub String);

/// Malformed heartbeat requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// No bearer token was sent.
    #[error("missing bearer token")]
    MissingToken,

    /// The authorization value is not `Bearer <token>`.
    #[error("malformed authorization value")]
    MalformedAuthorization,

    /// No status code was sent.
    #[error("missing heartbeat status")]
    MissingStatus,

    /// The status code is unknown.
    #[error(transparent)]
    UnknownStatus(#[from] ParseWireStatusError),

    /// The task reference is not a UUID.
    #[error("invalid task identifier '{0}'")]
    InvalidTaskId(String),
}

impl ProtocolError {
    /// Returns the HTTP status code for the error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingToken | Self::MalformedAuthorization => 403,
            Self::MissingStatus | Self::UnknownStatus(_) | Self::InvalidTaskId(_) => 400,
        }
    }
}

/// A parsed heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    token: String,
    status: WireStatus,
    task_id: Option<TaskId>,
}

impl HeartbeatRequest {
    /// Creates a heartbeat with no explicit task reference.
    #[must_use]
    pub fn new(token: impl Into<String>, status: WireStatus) -> Self {
        Self {
            token: token.into(),
            status,
            task_id: None,
        }
    }

    /// Names the task the report refers to.
    #[must_use]
    pub const fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Parses the raw header values of a heartbeat.
    ///
    /// `authorization` must be `Bearer <token>`; the scheme is matched
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for missing or malformed values.
    pub fn from_wire(
        authorization: Option<&str>,
        status: Option<&str>,
        task: Option<&str>,
    ) -> Result<Self, ProtocolError> {
        let token = parse_bearer(authorization)?;
        let status_code = status.ok_or(ProtocolError::MissingStatus)?;
        let task_id = task
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                Uuid::parse_str(value)
                    .map(TaskId::from_uuid)
                    .map_err(|_| ProtocolError::InvalidTaskId(value.to_owned()))
            })
            .transpose()?;

        Ok(Self {
            token,
            status: WireStatus::try_from(status_code)?,
            task_id,
        })
    }

    /// Returns the bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the reported status.
    #[must_use]
    pub const fn status(&self) -> WireStatus {
        self.status
    }

    /// Returns the task the report names, if any.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }
}

/// Extracts the token from a `Bearer <token>` authorization value.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingToken`] when no value or an empty token is
/// given and [`ProtocolError::MalformedAuthorization`] for other schemes.
pub(crate) fn parse_bearer(authorization: Option<&str>) -> Result<String, ProtocolError> {
    let value = authorization.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ProtocolError::MissingToken);
    }
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ProtocolError::MalformedAuthorization);
    }
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::MissingToken);
    }
    Ok(trimmed.to_owned())
}

/// Task fields a builder needs to run an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedTask {
    /// Task identifier to report back.
    pub id: TaskId,
    /// Target operating system.
    pub os: String,
    /// Target architecture.
    pub arch: String,
    /// Required tags, sorted.
    pub tags: Vec<String>,
    /// Commit to build.
    pub commit: String,
}

/// Payload of the heartbeat response that hands over a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedWork {
    /// Import path to check the sources out under.
    pub import_path: String,
    /// Root directory and name prefix for artifacts.
    pub pack_root: String,
    /// Files and directories to pack.
    pub pack_entries: Vec<String>,
    /// Archive formats to produce.
    pub pack_formats: Vec<String>,
    /// The task itself.
    pub task: AssignedTask,
}

impl AssignedWork {
    /// Builds the payload for `task`.
    #[must_use]
    pub fn new(task: &Task, project: &ProjectConfig) -> Self {
        let requirements = task.requirements();
        Self {
            import_path: project.import_path.clone(),
            pack_root: project.pack_root.clone(),
            pack_entries: project.pack_entries.clone(),
            pack_formats: project.pack_formats.clone(),
            task: AssignedTask {
                id: task.id(),
                os: requirements.platform().os().to_owned(),
                arch: requirements.platform().arch().to_owned(),
                tags: requirements.tags().to_vec(),
                commit: task.commit().as_str().to_owned(),
            },
        }
    }
}

/// Response to a builder request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderResponse {
    /// Acknowledged; nothing to hand over.
    NoContent,
    /// A newly assigned task.
    Assigned(Box<AssignedWork>),
    /// The token is unknown.
    Forbidden,
}

impl BuilderResponse {
    /// Returns the HTTP status code for the response.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NoContent => 204,
            Self::Assigned(_) => 200,
            Self::Forbidden => 403,
        }
    }

    /// Returns the assigned work, if any.
    #[must_use]
    pub fn assigned_work(&self) -> Option<&AssignedWork> {
        match self {
            Self::Assigned(work) => Some(work),
            Self::NoContent | Self::Forbidden => None,
        }
    }
}

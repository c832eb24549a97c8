//! Coordinator configuration.
//!
//! Configuration is a JSON document. Every section has defaults, so an empty
//! object is a valid (if not very useful) configuration:
//!
//! ```json
//! {
//!   "scheduler": { "interval_secs": 30 },
//!   "liveness": { "heartbeat_interval_secs": 60 },
//!   "project": {
//!     "name": "kiln",
//!     "clone_url": "https://example.com/kiln.git",
//!     "commit_url_template": "https://example.com/kiln/commit/{{ sha }}",
//!     "import_path": "example.com/kiln",
//!     "branches": ["main"],
//!     "pack_root": "kiln",
//!     "pack_entries": ["kiln", "README.md"],
//!     "pack_formats": ["tar.gz", "zip"]
//!   },
//!   "batch": [{ "os": "linux", "arch": "amd64", "tags": [] }]
//! }
//! ```

use crate::task::domain::{ArtifactFormat, CommitId, TaskDomainError, TaskRequirements};
use cap_std::fs::Dir;
use chrono::{DateTime, TimeDelta, Utc};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default seconds between scheduler cycles.
const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 30;

/// Default heartbeat interval, which is also the liveness window.
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;

/// Errors returned while loading or using configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(Arc<std::io::Error>),

    /// The document is not valid JSON for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(Arc<serde_json::Error>),

    /// A value is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A batch target is not a valid platform and tag set.
    #[error("invalid batch target: {0}")]
    BatchTarget(#[from] TaskDomainError),

    /// The commit URL template failed to render.
    #[error("failed to render commit URL: {reason}")]
    TemplateRender {
        /// Renderer error message.
        reason: String,
    },
}

/// Scheduler timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between assignment cycles.
    pub interval_secs: u64,
}

impl SchedulerConfig {
    /// Returns the cycle interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SCHEDULER_INTERVAL_SECS,
        }
    }
}

/// Heartbeat timing used to decide whether a builder is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Seconds builders wait between heartbeats.
    pub heartbeat_interval_secs: u64,
}

impl LivenessConfig {
    /// Returns the liveness window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Returns the oldest heartbeat time that still counts as live at `now`.
    #[must_use]
    pub fn live_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = TimeDelta::from_std(self.window()).unwrap_or(TimeDelta::MAX);
        now.checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

/// The project builders compile and package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Display name.
    pub name: String,
    /// Repository URL used for commit resolution.
    pub clone_url: String,
    /// `minijinja` template for links to a commit; `sha` is the full hash.
    pub commit_url_template: String,
    /// Import path builders check the sources out under.
    pub import_path: String,
    /// Branches offered to task posters.
    pub branches: Vec<String>,
    /// Prefix of artifact names and root directory inside archives.
    pub pack_root: String,
    /// Files and directories builders pack.
    pub pack_entries: Vec<String>,
    /// Archive formats builders produce.
    pub pack_formats: Vec<String>,
}

impl ProjectConfig {
    /// Returns the validated artifact formats.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a format is malformed.
    pub fn artifact_formats(&self) -> Result<Vec<ArtifactFormat>, ConfigError> {
        self.pack_formats
            .iter()
            .map(|format| {
                ArtifactFormat::new(format.as_str())
                    .map_err(|err| ConfigError::Invalid(err.to_string()))
            })
            .collect()
    }

    /// Renders the link to `commit`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TemplateRender`] when the template is invalid.
    pub fn render_commit_url(&self, commit: &CommitId) -> Result<String, ConfigError> {
        let environment = Environment::new();
        let mut context = Map::new();
        context.insert("sha".to_owned(), Value::String(commit.as_str().to_owned()));
        context.insert("project".to_owned(), Value::String(self.name.clone()));
        environment
            .render_str(&self.commit_url_template, context)
            .map_err(|error| ConfigError::TemplateRender {
                reason: error.to_string(),
            })
    }
}

/// One platform and tag set built by batch task creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTarget {
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
    /// Required tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl BatchTarget {
    /// Parses the target into task requirements.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Requirements`] when the platform or a tag
    /// is invalid.
    pub fn requirements(&self) -> Result<TaskRequirements, TaskDomainError> {
        TaskRequirements::parse(self.os.as_str(), self.arch.as_str(), self.tags.iter().cloned())
    }
}

/// Complete coordinator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Scheduler timing.
    pub scheduler: SchedulerConfig,
    /// Builder liveness window.
    pub liveness: LivenessConfig,
    /// Project packaging settings.
    pub project: ProjectConfig,
    /// Targets created by batch task creation.
    pub batch: Vec<BatchTarget>,
}

impl CoordinatorConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or any validation
    /// error from [`Self::validate`].
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|err| ConfigError::Parse(Arc::new(err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates `file_name` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn load(dir: &Dir, file_name: &str) -> Result<Self, ConfigError> {
        let document = dir
            .read_to_string(file_name)
            .map_err(|err| ConfigError::Io(Arc::new(err)))?;
        Self::from_json_str(&document)
    }

    /// Checks value ranges and formats.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero intervals, a `pack_root`
    /// that is not a plain file name prefix, malformed formats or an
    /// unparsable commit URL template, and [`ConfigError::BatchTarget`] for
    /// invalid batch targets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_secs must be positive".to_owned(),
            ));
        }
        if self.liveness.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "liveness.heartbeat_interval_secs must be positive".to_owned(),
            ));
        }
        if self
            .project
            .pack_root
            .chars()
            .any(|c| matches!(c, '/' | '\\') || c.is_whitespace())
        {
            return Err(ConfigError::Invalid(format!(
                "project.pack_root '{}' must not contain separators or whitespace",
                self.project.pack_root
            )));
        }
        self.project.artifact_formats()?;
        Environment::new()
            .template_from_str(&self.project.commit_url_template)
            .map_err(|err| ConfigError::Invalid(format!("project.commit_url_template: {err}")))?;
        for target in &self.batch {
            target.requirements()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn empty_document_uses_defaults() {
        let config = CoordinatorConfig::from_json_str("{}").expect("empty config is valid");
        assert_eq!(config.scheduler.interval(), Duration::from_secs(30));
        assert_eq!(config.liveness.window(), Duration::from_secs(60));
        assert!(config.batch.is_empty());
    }

    #[rstest]
    fn parses_project_and_batch_sections() {
        let document = r#"{
            "scheduler": { "interval_secs": 5 },
            "project": {
                "name": "kiln",
                "commit_url_template": "https://example.com/commit/{{ sha }}",
                "pack_root": "kiln",
                "pack_formats": ["tar.gz", "zip"]
            },
            "batch": [{ "os": "linux", "arch": "amd64" }, { "os": "darwin", "arch": "arm64", "tags": ["cgo"] }]
        }"#;
        let config = CoordinatorConfig::from_json_str(document).expect("valid config");

        assert_eq!(config.scheduler.interval(), Duration::from_secs(5));
        assert_eq!(config.batch.len(), 2);
        let formats = config.project.artifact_formats().expect("valid formats");
        assert_eq!(
            formats.iter().map(ArtifactFormat::as_str).collect::<Vec<_>>(),
            vec!["tar.gz", "zip"]
        );
    }

    #[rstest]
    fn renders_commit_url() {
        let project = ProjectConfig {
            commit_url_template: "https://example.com/commit/{{ sha }}".to_owned(),
            ..ProjectConfig::default()
        };
        let commit = CommitId::new("0123456789abcdef0123456789abcdef01234567").expect("valid commit");
        let url = project.render_commit_url(&commit).expect("template renders");
        assert_eq!(
            url,
            "https://example.com/commit/0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[rstest]
    #[case::zero_interval(r#"{ "scheduler": { "interval_secs": 0 } }"#)]
    #[case::zero_heartbeat(r#"{ "liveness": { "heartbeat_interval_secs": 0 } }"#)]
    #[case::pack_root_with_slash(r#"{ "project": { "pack_root": "../escape" } }"#)]
    #[case::bad_format(r#"{ "project": { "pack_formats": ["tar gz"] } }"#)]
    #[case::bad_template(r#"{ "project": { "commit_url_template": "{{ sha" } }"#)]
    #[case::bad_batch_target(r#"{ "batch": [{ "os": "", "arch": "amd64" }] }"#)]
    fn rejects_invalid_documents(#[case] document: &str) {
        assert!(CoordinatorConfig::from_json_str(document).is_err());
    }

    #[rstest]
    fn live_since_subtracts_window() {
        let liveness = LivenessConfig::default();
        let now = Utc::now();
        assert_eq!(liveness.live_since(now), now - TimeDelta::seconds(60));
    }
}

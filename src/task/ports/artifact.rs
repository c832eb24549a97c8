//! Port for storing built artifacts.

use crate::task::domain::{ArtifactFormat, Task};
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

/// Result type for artifact store operations.
pub type ArtifactStoreResult<T> = Result<T, ArtifactStoreError>;

/// File storage for the archives builders upload.
///
/// Artifacts are keyed by task and format; the store decides the file name,
/// normally through [`Task::artifact_name`].
pub trait ArtifactStore: Send + Sync {
    /// Opens a sink that replaces the artifact for `task` in `format`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Io`] when the sink cannot be created.
    fn open_sink(
        &self,
        task: &Task,
        format: &ArtifactFormat,
    ) -> ArtifactStoreResult<Box<dyn Write + Send>>;

    /// Deletes the artifact for `task` in `format`; a missing file is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::Io`] when the file exists but cannot be
    /// removed.
    fn remove(&self, task: &Task, format: &ArtifactFormat) -> ArtifactStoreResult<()>;
}

/// Errors returned by artifact stores.
#[derive(Debug, Clone, Error)]
pub enum ArtifactStoreError {
    /// Filesystem or sink failure.
    #[error("artifact storage error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for ArtifactStoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

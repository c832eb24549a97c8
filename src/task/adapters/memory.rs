//! In-memory adapters for tests and embedding.

use crate::task::{
    domain::{ArtifactFormat, BranchName, CommitId, Task},
    ports::{ArtifactStore, ArtifactStoreResult, CommitResolutionError, CommitResolver},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::sync::{Arc, RwLock};

/// Commit resolver backed by a fixed branch table.
#[derive(Debug, Clone, Default)]
pub struct StaticCommitResolver {
    branches: HashMap<BranchName, CommitId>,
}

impl StaticCommitResolver {
    /// Creates a resolver that knows no branches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a branch.
    #[must_use]
    pub fn with_branch(mut self, branch: BranchName, commit: CommitId) -> Self {
        self.branches.insert(branch, commit);
        self
    }
}

#[async_trait]
impl CommitResolver for StaticCommitResolver {
    async fn resolve(&self, branch: &BranchName) -> Result<CommitId, CommitResolutionError> {
        self.branches
            .get(branch)
            .cloned()
            .ok_or_else(|| CommitResolutionError::BranchNotFound(branch.clone()))
    }
}

/// Artifact store that keeps files in memory.
#[derive(Debug, Clone)]
pub struct InMemoryArtifactStore {
    pack_root: String,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing_removals: HashSet<ArtifactFormat>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store naming artifacts after `pack_root`.
    #[must_use]
    pub fn new(pack_root: impl Into<String>) -> Self {
        Self {
            pack_root: pack_root.into(),
            files: Arc::new(RwLock::new(HashMap::new())),
            failing_removals: HashSet::new(),
        }
    }

    /// Makes every removal of `format` fail, for exercising best-effort
    /// cleanup.
    #[must_use]
    pub fn with_failing_removal(mut self, format: ArtifactFormat) -> Self {
        self.failing_removals.insert(format);
        self
    }

    /// Stores `contents` directly under the artifact name of `task`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the internal lock is poisoned.
    pub fn put(&self, task: &Task, format: &ArtifactFormat, contents: &[u8]) -> io::Result<()> {
        let name = task.artifact_name(&self.pack_root, format);
        let mut files = self.files.write().map_err(|err| io::Error::other(err.to_string()))?;
        files.insert(name, contents.to_vec());
        Ok(())
    }

    /// Returns the stored bytes for `task` in `format`.
    #[must_use]
    pub fn contents(&self, task: &Task, format: &ArtifactFormat) -> Option<Vec<u8>> {
        let name = task.artifact_name(&self.pack_root, format);
        self.files.read().ok()?.get(&name).cloned()
    }

    /// Returns the names of all stored artifacts, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn open_sink(
        &self,
        task: &Task,
        format: &ArtifactFormat,
    ) -> ArtifactStoreResult<Box<dyn Write + Send>> {
        let name = task.artifact_name(&self.pack_root, format);
        let mut files = self.files.write().map_err(|err| io::Error::other(err.to_string()))?;
        files.insert(name.clone(), Vec::new());
        Ok(Box::new(MemorySink {
            name,
            files: Arc::clone(&self.files),
        }))
    }

    fn remove(&self, task: &Task, format: &ArtifactFormat) -> ArtifactStoreResult<()> {
        if self.failing_removals.contains(format) {
            return Err(io::Error::other(format!("removal of {format} artifacts is disabled")).into());
        }
        let name = task.artifact_name(&self.pack_root, format);
        let mut files = self.files.write().map_err(|err| io::Error::other(err.to_string()))?;
        files.remove(&name);
        Ok(())
    }
}

struct MemorySink {
    name: String,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = self.files.write().map_err(|err| io::Error::other(err.to_string()))?;
        files.entry(self.name.clone()).or_default().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

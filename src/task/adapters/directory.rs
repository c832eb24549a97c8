//! Artifact storage in a capability-scoped directory.

use crate::task::{
    domain::{ArtifactFormat, Task},
    ports::{ArtifactStore, ArtifactStoreResult},
};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use std::io::{self, Write};
use std::path::Path;

/// Artifact store writing into a single directory.
///
/// All access goes through a [`Dir`] handle, so artifact names can never
/// escape the directory.
#[derive(Debug)]
pub struct DirArtifactStore {
    dir: Dir,
    pack_root: String,
}

impl DirArtifactStore {
    /// Wraps an already opened directory.
    #[must_use]
    pub fn new(dir: Dir, pack_root: impl Into<String>) -> Self {
        Self {
            dir,
            pack_root: pack_root.into(),
        }
    }

    /// Opens the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be opened.
    pub fn open(path: impl AsRef<Path>, pack_root: impl Into<String>) -> io::Result<Self> {
        let dir = Dir::open_ambient_dir(path, ambient_authority())?;
        Ok(Self::new(dir, pack_root))
    }
}

impl ArtifactStore for DirArtifactStore {
    fn open_sink(
        &self,
        task: &Task,
        format: &ArtifactFormat,
    ) -> ArtifactStoreResult<Box<dyn Write + Send>> {
        let file = self.dir.create(task.artifact_name(&self.pack_root, format))?;
        Ok(Box::new(file))
    }

    fn remove(&self, task: &Task, format: &ArtifactFormat) -> ArtifactStoreResult<()> {
        match self.dir.remove_file(task.artifact_name(&self.pack_root, format)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

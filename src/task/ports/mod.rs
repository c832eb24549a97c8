//! Port contracts for task persistence, commit resolution and artifact
//! storage.

mod artifact;
mod commit;
mod repository;

pub use artifact::{ArtifactStore, ArtifactStoreError, ArtifactStoreResult};
pub use commit::{CommitResolutionError, CommitResolver};
pub use repository::{TaskInsertion, TaskRepository, TaskRepositoryError, TaskRepositoryResult};

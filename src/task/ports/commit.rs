//! Port for resolving branch names to commits.

use crate::task::domain::{BranchName, CommitId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Source control lookup used when a task is created.
#[async_trait]
pub trait CommitResolver: Send + Sync {
    /// Returns the commit the branch currently points at.
    ///
    /// # Errors
    ///
    /// Returns [`CommitResolutionError`] when the branch is unknown or the
    /// source control host cannot be queried.
    async fn resolve(&self, branch: &BranchName) -> Result<CommitId, CommitResolutionError>;
}

/// Errors returned by commit resolvers.
#[derive(Debug, Clone, Error)]
pub enum CommitResolutionError {
    /// The branch does not exist on the remote.
    #[error("branch not found: {0}")]
    BranchNotFound(BranchName),

    /// The remote answered with something that is not a commit.
    #[error("unexpected commit resolver output: {0}")]
    InvalidOutput(String),

    /// The lookup itself failed.
    #[error("commit resolution failed: {0}")]
    Lookup(Arc<dyn std::error::Error + Send + Sync>),
}

impl CommitResolutionError {
    /// Wraps a lookup failure.
    pub fn lookup(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Lookup(Arc::new(err))
    }
}

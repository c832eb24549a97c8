//! Adapters for the commit resolution and artifact storage ports.
//!
//! Task persistence adapters live in [`crate::store`].

mod directory;
mod git;
mod memory;

pub use directory::DirArtifactStore;
pub use git::GitCommitResolver;
pub use memory::{InMemoryArtifactStore, StaticCommitResolver};

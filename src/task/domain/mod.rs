//! Domain model for build tasks.
//!
//! A task asks for one build of a resolved commit on a platform with a set
//! of tags. Its status moves through a fixed state machine; the builder
//! reference is set only while the task is being built or uploaded.

mod artifact;
mod branch;
mod error;
mod ids;
mod requirements;
mod status;
mod task;

pub use artifact::ArtifactFormat;
pub use branch::{BranchName, CommitId};
pub use error::{ParseTaskStatusError, TaskDomainError};
pub use ids::{PosterId, TaskId};
pub use requirements::TaskRequirements;
pub use status::{BuildOutcome, TaskStatus};
pub use task::{PersistedTaskData, Task};

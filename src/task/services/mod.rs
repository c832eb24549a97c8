//! Orchestration services for task creation, lookup and archiving.

mod lifecycle;

pub use lifecycle::{
    ArchiveReport, ArtifactCleanupFailure, BatchRejection, BatchReport, CreateTaskRequest,
    TaskCreation, TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
};

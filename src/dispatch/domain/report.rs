//! Assignment cycle reports.

use crate::builder::domain::BuilderId;
use crate::task::domain::TaskId;

/// A task handed to a builder during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Assigned task.
    pub task_id: TaskId,
    /// Builder now holding the task.
    pub builder_id: BuilderId,
}

/// What one assignment cycle did with each pending task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Tasks assigned this cycle, in processing order.
    pub assigned: Vec<Assignment>,
    /// Tasks no registered capability can serve.
    pub unmatched: Vec<TaskId>,
    /// Tasks with candidates, none of them idle and live.
    pub awaiting_builder: Vec<TaskId>,
    /// Tasks whose assignment lost a race and stay pending.
    pub conflicts: Vec<TaskId>,
    /// Tasks whose processing failed with an error.
    pub failed: Vec<TaskId>,
}

impl CycleReport {
    /// Returns the number of tasks the cycle looked at.
    #[must_use]
    pub fn evaluated(&self) -> usize {
        self.assigned.len()
            + self.unmatched.len()
            + self.awaiting_builder.len()
            + self.conflicts.len()
            + self.failed.len()
    }
}

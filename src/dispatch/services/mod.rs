//! Assignment scheduling and heartbeat handling services.

mod heartbeat;
mod scheduler;

pub use heartbeat::{HeartbeatError, HeartbeatResult, HeartbeatService};
pub use scheduler::{AssignmentScheduler, SchedulerError, SchedulerHandle};

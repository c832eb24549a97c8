//! Dispatch wire types, cycle reports and the shared transition rules.

mod protocol;
mod report;
mod transition;

pub use protocol::{
    AssignedTask, AssignedWork, BuilderResponse, HeartbeatRequest, ParseWireStatusError,
    ProtocolError, WireStatus,
};
pub use report::{Assignment, CycleReport};
pub use transition::{
    AssignmentConflict, DispatchRejection, TransitionEffect, apply_assignment, apply_release,
    apply_upload,
};

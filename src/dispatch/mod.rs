//! Task dispatch: the assignment scheduler and the builder heartbeat
//! protocol.
//!
//! The scheduler periodically pairs pending tasks with idle, live builders
//! that can serve them. Builders learn about their assignment only by
//! polling: the first idle heartbeat after an assignment carries the task.
//! Later heartbeats report upload progress and the final outcome, which
//! release the builder.
//!
//! Every write that touches both a builder and a task goes through
//! [`ports::DispatchStore`] as a single conditional transaction.

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

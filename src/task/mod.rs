//! Build task lifecycle.
//!
//! Tasks are created pending for a resolved commit, assigned to builders by
//! the scheduler, advanced by builder heartbeats and finally archived by an
//! operator. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Commit resolution and artifact storage adapters in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

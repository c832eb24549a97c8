//! Builder registration and authentication.
//!
//! Builders are remote agents that pull build tasks through heartbeats. This
//! context owns their identity, display name, hashed authentication token,
//! trust level, and the liveness and assignment fields that the dispatch
//! context mutates atomically. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Orchestration services in [`services`]
//!
//! Storage adapters live in [`crate::store`] because builder, capability and
//! task records share transactions.

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

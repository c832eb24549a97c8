//! Unit tests for the dispatch module.
//!
//! Scheduler and heartbeat tests drive the services against the in-memory
//! store with a manually advanced clock.

mod protocol_tests;

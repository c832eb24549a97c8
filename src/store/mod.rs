//! Storage adapters implementing every repository port at once.
//!
//! Dispatch writes touch a builder and a task together, so each adapter keeps
//! builders, capability entries and tasks behind one consistency boundary:
//! a single lock for [`InMemoryStore`] and a single database for
//! [`PostgresStore`].

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{CoordinatorPgPool, PostgresStore};

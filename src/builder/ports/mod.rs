//! Port contracts for builder persistence.

mod repository;

pub use repository::{BuilderRepository, BuilderRepositoryError, BuilderRepositoryResult};

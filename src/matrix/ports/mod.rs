//! Port contracts for capability persistence.

mod repository;

pub use repository::{
    CapabilityRepository, CapabilityRepositoryError, CapabilityRepositoryResult,
};

//! Orchestration services for builder registration.

mod registry;

pub use registry::{
    BuilderRegistryService, BuilderRegistryServiceError, BuilderRegistryServiceResult,
    RegisterBuilderRequest, RegisteredBuilder, UpdateBuilderRequest,
};

//! Capability registry and match engine services.

mod matcher;
mod registry;

pub use matcher::{MatchEngine, match_entries};
pub use registry::{CapabilityRegistry, CapabilityRegistryError, CapabilityRegistryResult};

//! Domain model for builder registration.

mod builder;
mod error;
mod ids;
mod name;
mod token;
mod trust;

pub use builder::{Builder, BuilderLiveness, PersistedBuilderData};
pub use error::{BuilderDomainError, ParseTrustLevelError};
pub use ids::BuilderId;
pub use name::BuilderName;
pub use token::{BuilderToken, TokenDigest};
pub use trust::TrustLevel;

//! Domain model for builder capabilities.

mod declaration;
mod entry;
mod error;
mod platform;
mod tags;

pub use declaration::CapabilityDeclaration;
pub use entry::CapabilityEntry;
pub use error::MatrixDomainError;
pub use platform::Platform;
pub use tags::TagSet;

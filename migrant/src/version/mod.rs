//! Versions, the registry that owns them and administrative ledger repair.

mod marker;
mod registry;
mod version;

pub use marker::*;
pub use registry::VersionRegistry;
pub use version::Version;

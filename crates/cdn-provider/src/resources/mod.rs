//! The resource types served by the provider.
use crate::registry::{self, Registry};

pub mod cdn;

/// Builds the registry of every resource type.
pub fn registry() -> Result<Registry, registry::Error> {
    Ok(Registry::builder().register(cdn::definition())?.build())
}

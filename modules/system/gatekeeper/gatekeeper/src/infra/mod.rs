//! In-process implementations of the gatekeeper's collaborators.

pub mod memory_cache;
pub mod rest_profiles;

pub use memory_cache::InMemoryResourceCache;
pub use rest_profiles::{RestClient, RestProfileFactory};

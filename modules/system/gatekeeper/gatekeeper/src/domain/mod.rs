//! Domain layer for the gatekeeper.

pub mod credentials;
pub mod descriptor;
pub mod error;
pub mod grants;
pub mod local_client;
pub mod modes;
pub mod profiles;
pub mod rbac;
pub mod service;

pub use error::DomainError;
pub use local_client::GatekeeperLocalClient;
pub use modes::Modes;
pub use profiles::ClusterProfiles;
pub use service::{Collaborators, Gatekeeper};

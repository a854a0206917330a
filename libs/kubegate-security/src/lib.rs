#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod claims;
pub mod constants;
pub mod rest_config;

pub use claims::{Claims, ClaimsBuilder};
pub use rest_config::{CredentialError, RestConfig};

//! Gatekeeper Module
//!
//! Resolves, for every inbound call, who is calling, which cluster client
//! profile serves the call, and whether the call is permitted.
//!
//! Provides [`domain::GatekeeperLocalClient`], the in-process implementation
//! of `gatekeeper_sdk::GatekeeperClient`, and the transport adapters in
//! [`interceptor`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;
pub mod interceptor;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod testing;

pub use config::GatekeeperConfig;
pub use domain::{ClusterProfiles, Collaborators, Gatekeeper, GatekeeperLocalClient};
pub use interceptor::{
    AuthorizationContextExt, Authorized, AuthorizingStream, GatekeeperLayer, GatekeeperService,
    RequestScope, StreamRecvError,
};

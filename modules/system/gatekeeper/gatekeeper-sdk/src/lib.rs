//! Gatekeeper SDK
//!
//! This crate provides the public API for the `gatekeeper` module:
//!
//! - [`GatekeeperClient`] - Public API trait used by transports
//! - [`AuthorizationContext`] - Resolved client profile and claims
//! - [`GatekeeperError`] - Caller-visible error classes
//! - [`plugin_api`] - Collaborator traits implemented by plugins
//!
//! ## Usage
//!
//! ```ignore
//! use gatekeeper_sdk::{CallMetadata, GatekeeperClient, RequestInput};
//!
//! let ctx = gatekeeper
//!     .authorize(&metadata, RequestInput::Descriptor(descriptor))
//!     .await?;
//! let workflows = ctx.profile().clients().workflow();
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;
pub mod plugin_api;

pub use api::GatekeeperClient;
pub use error::{GatekeeperError, PluginError};
pub use models::{
    AuthMode, AuthorizationContext, CallMetadata, ClientKind, ClientProfile, ClusterClient,
    ClusterClients, RequestDescriptor, RequestInput, ScopedRequest, Secret, ServiceAccount,
    ServiceAccountRule,
};
pub use plugin_api::{PolicyEngine, ProfileFactory, ResourceCache, RuleEvaluator, SsoAuthorizer};

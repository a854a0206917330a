//! Collaborator traits implemented by gatekeeper plugins.
//!
//! The gatekeeper owns none of these concerns: token validation, policy
//! storage and evaluation, resource listing, predicate evaluation and client
//! construction are all delegated through the traits below.

use async_trait::async_trait;
use kubegate_security::{Claims, RestConfig};

use crate::error::PluginError;
use crate::models::{ClientProfile, Secret, ServiceAccount};

/// Validates single sign-on tokens.
#[async_trait]
pub trait SsoAuthorizer: Send + Sync {
    /// Validate `token` (the full `Bearer v2:...` value) and return its claims.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the token is invalid or expired
    /// - `Internal` for unexpected errors
    async fn authorize(&self, token: &str) -> Result<Claims, PluginError>;

    /// Whether SSO identities are mapped onto service accounts by rule.
    fn is_rbac_enabled(&self) -> bool;
}

/// Policy engine holding subject/object/action rules and subject-to-role edges.
///
/// Adding an edge that exists and removing one that does not are both no-ops.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns `Internal` if the engine cannot evaluate the request.
    async fn enforce(&self, subject: &str, object: &str, action: &str)
    -> Result<bool, PluginError>;

    /// Add `subject -> role`. Returns whether the edge was newly added.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the engine rejects the edge.
    async fn add_grouping_policy(&self, subject: &str, role: &str) -> Result<bool, PluginError>;

    /// Remove `subject -> role`. Returns whether the edge was removed.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the engine fails to remove the edge.
    async fn remove_grouping_policy(&self, subject: &str, role: &str)
    -> Result<bool, PluginError>;
}

/// Read access to cached service accounts and secrets.
#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// # Errors
    ///
    /// Returns `Internal` if the cache cannot be read.
    async fn list_service_accounts(
        &self,
        namespace: &str,
    ) -> Result<Vec<ServiceAccount>, PluginError>;

    /// # Errors
    ///
    /// Returns `NotFound` if the secret does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, PluginError>;
}

/// Evaluates boolean rule predicates over a JSON document.
pub trait RuleEvaluator: Send + Sync {
    /// # Errors
    ///
    /// - `InvalidInput` if `expression` does not compile or is not boolean
    /// - `Internal` if evaluation fails
    fn eval_bool(&self, expression: &str, input: &serde_json::Value) -> Result<bool, PluginError>;
}

/// Builds a client profile from REST credentials.
pub trait ProfileFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns `Internal` if clients cannot be built from `rest_config`.
    fn new_profile(&self, rest_config: RestConfig) -> Result<ClientProfile, PluginError>;
}

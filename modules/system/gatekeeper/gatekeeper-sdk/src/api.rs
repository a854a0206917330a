//! Public API trait for the gatekeeper.
//!
//! Transports (the unary layer, the stream wrapper, the CLI) call this trait
//! once per call or per stream message.

use async_trait::async_trait;

use crate::error::GatekeeperError;
use crate::models::{AuthorizationContext, CallMetadata, RequestInput};

/// Public API trait for the gatekeeper.
#[async_trait]
pub trait GatekeeperClient: Send + Sync {
    /// Resolve who is calling, which cluster profile serves the call, and
    /// whether the call is permitted.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if no credential matches an enabled mode, or the
    ///   identity authorizer rejects the token
    /// - `PermissionDenied` if policy enforcement or RBAC delegation refuses the call
    /// - `Internal` for unknown clusters, engine failures and missing credentials
    async fn authorize(
        &self,
        metadata: &CallMetadata,
        request: RequestInput<'_>,
    ) -> Result<AuthorizationContext, GatekeeperError>;
}

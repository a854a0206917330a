//! Local (in-process) client for the gatekeeper.

use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_sdk::{
    AuthorizationContext, CallMetadata, GatekeeperClient, GatekeeperError, RequestInput,
};

use super::{DomainError, Gatekeeper};

/// Local client wrapping the gatekeeper service.
#[derive(Clone)]
pub struct GatekeeperLocalClient {
    svc: Arc<Gatekeeper>,
}

impl GatekeeperLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Gatekeeper>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> GatekeeperError {
    let converted = GatekeeperError::from(e);
    match &converted {
        GatekeeperError::Internal(reason) => {
            tracing::error!(operation = op, error = %reason, "gatekeeper call failed");
        }
        GatekeeperError::Unauthenticated(_) | GatekeeperError::PermissionDenied(_) => {
            tracing::debug!(operation = op, error = %converted, "gatekeeper refused call");
        }
    }
    converted
}

#[async_trait]
impl GatekeeperClient for GatekeeperLocalClient {
    async fn authorize(
        &self,
        metadata: &CallMetadata,
        request: RequestInput<'_>,
    ) -> Result<AuthorizationContext, GatekeeperError> {
        self.svc
            .authorize(metadata, request)
            .await
            .map_err(|e| log_and_convert("authorize", e))
    }
}

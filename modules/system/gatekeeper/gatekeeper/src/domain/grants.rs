//! Group memberships granted to a subject for the span of one decision.

use std::future::Future;
use std::sync::Arc;

use gatekeeper_sdk::PolicyEngine;

use super::error::DomainError;

/// Edges `subject -> role` added to the policy engine, removed on release.
///
/// Call [`TransientGrants::release`] on every path. If the guard is dropped
/// unreleased (the owning future was cancelled) removal is spawned on the
/// current tokio runtime.
#[must_use = "grants must be released"]
pub struct TransientGrants {
    engine: Arc<dyn PolicyEngine>,
    subject: String,
    roles: Vec<String>,
}

impl TransientGrants {
    /// Add one edge per role. If an add fails, edges already added are
    /// removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `PolicyEngine` if the engine rejects an edge.
    pub async fn acquire(
        engine: Arc<dyn PolicyEngine>,
        subject: &str,
        roles: Vec<String>,
    ) -> Result<Self, DomainError> {
        let mut grants = Self {
            engine,
            subject: subject.to_owned(),
            roles: Vec::with_capacity(roles.len()),
        };
        for role in roles {
            if let Err(e) = grants.engine.add_grouping_policy(subject, &role).await {
                grants.release().await;
                return Err(DomainError::PolicyEngine(format!(
                    "failed to add policy for group {role:?}: {e}"
                )));
            }
            grants.roles.push(role);
        }
        Ok(grants)
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Remove every edge this guard added. Failures are logged, not returned.
    pub async fn release(mut self) {
        let roles = std::mem::take(&mut self.roles);
        remove_all(self.engine.as_ref(), &self.subject, roles).await;
    }
}

async fn remove_all(engine: &dyn PolicyEngine, subject: &str, roles: Vec<String>) {
    for role in roles {
        if let Err(e) = engine.remove_grouping_policy(subject, &role).await {
            tracing::error!(sub = %subject, group = %role, error = %e, "failed to remove policy");
        }
    }
}

impl Drop for TransientGrants {
    fn drop(&mut self) {
        if self.roles.is_empty() {
            return;
        }
        let roles = std::mem::take(&mut self.roles);
        let engine = Arc::clone(&self.engine);
        let subject = std::mem::take(&mut self.subject);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tracing::warn!(
                sub = %subject,
                count = roles.len(),
                "grants dropped unreleased, removing in background"
            );
            handle.spawn(async move {
                remove_all(engine.as_ref(), &subject, roles).await;
            });
        } else {
            tracing::error!(
                sub = %subject,
                groups = ?roles,
                "grants dropped outside a runtime and left in the policy engine"
            );
        }
    }
}

/// Run `decide` while `subject` holds `roles`, then remove them whatever
/// `decide` returned.
///
/// # Errors
///
/// Returns `PolicyEngine` if the grants cannot be added, otherwise whatever
/// `decide` returns.
pub async fn with_transient_grants<F, Fut, T>(
    engine: &Arc<dyn PolicyEngine>,
    subject: &str,
    roles: Vec<String>,
    decide: F,
) -> Result<T, DomainError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let grants = TransientGrants::acquire(Arc::clone(engine), subject, roles).await?;
    let outcome = decide().await;
    grants.release().await;
    outcome
}

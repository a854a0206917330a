//! The authorization orchestrator.

use std::sync::Arc;

use gatekeeper_sdk::{
    AuthMode, AuthorizationContext, CallMetadata, ClientProfile, PolicyEngine, ProfileFactory,
    RequestDescriptor, RequestInput, ResourceCache, RuleEvaluator, SsoAuthorizer,
};
use kubegate_security::{Claims, RestConfig};

use super::credentials;
use super::descriptor;
use super::error::DomainError;
use super::grants::with_transient_grants;
use super::modes::Modes;
use super::profiles::ClusterProfiles;
use super::rbac::{DelegationPolicy, ServiceAccountSelector};
use crate::config::GatekeeperConfig;

/// External collaborators of the gatekeeper.
#[derive(Clone)]
pub struct Collaborators {
    pub policy: Arc<dyn PolicyEngine>,
    pub cache: Arc<dyn ResourceCache>,
    pub evaluator: Arc<dyn RuleEvaluator>,
    pub profiles: Arc<dyn ProfileFactory>,
    /// Required when SSO mode is enabled.
    pub sso: Option<Arc<dyn SsoAuthorizer>>,
}

/// Resolves identity, cluster profile and permission for each call.
///
/// Built once and shared; nothing in it changes after construction.
pub struct Gatekeeper {
    modes: Modes,
    clusters: ClusterProfiles,
    namespace: String,
    server_account: String,
    policy: Arc<dyn PolicyEngine>,
    profiles: Arc<dyn ProfileFactory>,
    sso: Option<Arc<dyn SsoAuthorizer>>,
    selector: ServiceAccountSelector,
}

impl Gatekeeper {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if no mode is enabled, if SSO is enabled
    /// without an authorizer, or if `clusters` was built for another primary
    /// cluster than `config` names.
    pub fn new(
        config: &GatekeeperConfig,
        clusters: ClusterProfiles,
        collaborators: Collaborators,
    ) -> Result<Self, DomainError> {
        let modes = Modes::new(config.modes.iter().copied())?;
        if modes.contains(AuthMode::Sso) && collaborators.sso.is_none() {
            return Err(DomainError::InvalidConfig(
                "sso mode requires an sso authorizer".to_owned(),
            ));
        }
        if clusters.primary_cluster() != config.primary_cluster {
            return Err(DomainError::InvalidConfig(format!(
                "primary cluster is \"{}\" but profiles were built for \"{}\"",
                config.primary_cluster,
                clusters.primary_cluster()
            )));
        }

        let selector = ServiceAccountSelector::new(
            collaborators.cache,
            collaborators.evaluator,
            Arc::clone(&collaborators.profiles),
            DelegationPolicy {
                sso_namespace: config.effective_sso_namespace().to_owned(),
                namespaced: config.namespaced,
                enabled: config.delegate_rbac_to_namespace,
            },
        );

        tracing::info!(
            modes = ?modes,
            primary_cluster = %config.primary_cluster,
            namespace = %config.namespace,
            "gatekeeper initialized"
        );

        Ok(Self {
            modes,
            clusters,
            namespace: config.namespace.clone(),
            server_account: config.server_account.clone(),
            policy: collaborators.policy,
            profiles: collaborators.profiles,
            sso: collaborators.sso,
            selector,
        })
    }

    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    #[must_use]
    pub fn clusters(&self) -> &ClusterProfiles {
        &self.clusters
    }

    /// Descriptor of `request`, derived when the caller did not supply one.
    #[must_use]
    pub fn describe(&self, request: RequestInput<'_>) -> RequestDescriptor {
        match request {
            RequestInput::Descriptor(d) => d.clone(),
            RequestInput::Call { method, request } => {
                descriptor::derive(method, request, self.clusters.primary_cluster())
            }
        }
    }

    /// Resolve one call.
    ///
    /// # Errors
    ///
    /// See [`DomainError`]; the mapping to caller-visible classes lives in
    /// `From<DomainError> for GatekeeperError`.
    #[tracing::instrument(skip_all, fields(mode = tracing::field::Empty))]
    pub async fn authorize(
        &self,
        metadata: &CallMetadata,
        request: RequestInput<'_>,
    ) -> Result<AuthorizationContext, DomainError> {
        let (mode, token) = self.modes.select(credentials::candidates(metadata))?;
        tracing::Span::current().record("mode", mode.as_str());
        let descriptor = self.describe(request);

        match mode {
            AuthMode::Client => self.authorize_client(&token),
            AuthMode::Server => self.authorize_server(&descriptor).await,
            AuthMode::Sso => self.authorize_sso(&token, &descriptor).await,
        }
    }

    fn authorize_client(&self, token: &str) -> Result<AuthorizationContext, DomainError> {
        let rest_config = self
            .clusters
            .primary()
            .rest_config()
            .for_authorization(token)
            .map_err(|e| DomainError::InvalidToken(e.to_string()))?;
        let claims = claims_for(&rest_config);
        let profile = self
            .profiles
            .new_profile(rest_config)
            .map_err(|e| DomainError::InvalidToken(e.to_string()))?;
        Ok(AuthorizationContext::new(Arc::new(profile), claims))
    }

    async fn authorize_server(
        &self,
        request: &RequestDescriptor,
    ) -> Result<AuthorizationContext, DomainError> {
        let claims = claims_for(self.clusters.primary().rest_config());
        let subject = format!(
            "serviceaccount:{}:{}:{}",
            self.clusters.primary_cluster(),
            self.namespace,
            self.server_account
        );
        self.enforce(&subject, request).await?;
        let profile = self.clusters.find(&request.cluster)?;
        Ok(AuthorizationContext::new(profile, claims))
    }

    async fn authorize_sso(
        &self,
        token: &str,
        request: &RequestDescriptor,
    ) -> Result<AuthorizationContext, DomainError> {
        let sso = self
            .sso
            .as_ref()
            .ok_or_else(|| DomainError::InvalidConfig("sso authorizer missing".to_owned()))?;
        let mut claims = sso
            .authorize(token)
            .await
            .map_err(|e| DomainError::InvalidToken(e.to_string()))?;

        let delegate: Arc<ClientProfile> = if sso.is_rbac_enabled() {
            match self
                .selector
                .authorize(&mut claims, &request.namespace, self.clusters.primary().rest_config())
                .await
            {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::error!(error = %e, "failed to perform RBAC authorization");
                    return Err(DomainError::NotAllowed);
                }
            }
        } else {
            tracing::info!(
                subject = %claims.subject(),
                email = claims.email().unwrap_or_default(),
                "using the default service account for user"
            );
            Arc::clone(self.clusters.primary())
        };

        let subject = format!("user:{}:{}", self.clusters.primary_cluster(), claims.subject());
        let roles = claims
            .groups()
            .iter()
            .map(|g| format!("group:{}:{g}", request.cluster))
            .collect();
        with_transient_grants(&self.policy, &subject, roles, || self.enforce(&subject, request))
            .await
            .map_err(|e| match e {
                DomainError::AccessDenied { .. } => {
                    tracing::warn!(error = %e, "sso request denied");
                    DomainError::NotAllowed
                }
                other => other,
            })?;

        let profile = if request.cluster == self.clusters.primary_cluster() {
            delegate
        } else {
            self.clusters.find(&request.cluster)?
        };
        Ok(AuthorizationContext::new(profile, claims))
    }

    async fn enforce(&self, subject: &str, request: &RequestDescriptor) -> Result<(), DomainError> {
        let object = request.policy_object();
        let allowed = self
            .policy
            .enforce(subject, &object, &request.action)
            .await
            .map_err(|e| DomainError::PolicyEngine(e.to_string()))?;
        if allowed {
            Ok(())
        } else {
            Err(DomainError::AccessDenied {
                subject: subject.to_owned(),
                object,
                action: request.action.clone(),
            })
        }
    }
}

/// Claims of `rest_config`, anonymous when none can be derived.
fn claims_for(rest_config: &RestConfig) -> Claims {
    match rest_config.claim_set() {
        Ok(Some(claims)) => claims,
        Ok(None) => Claims::anonymous(),
        Err(e) => {
            tracing::debug!(error = %e, "claims unknown for credential");
            Claims::anonymous()
        }
    }
}

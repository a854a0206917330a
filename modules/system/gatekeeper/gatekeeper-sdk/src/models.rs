//! Domain models for the gatekeeper module.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use kubegate_security::constants::{ANNOTATION_RBAC_RULE, ANNOTATION_RBAC_RULE_PRECEDENCE};
use kubegate_security::{Claims, RestConfig};
use serde::{Deserialize, Serialize};

/// How a caller authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// The caller presents its own cluster credential.
    Client,
    /// The server acts with its own service identity.
    Server,
    /// Single sign-on token validated by the identity authorizer.
    Sso,
}

impl AuthMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
            Self::Sso => "sso",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            "sso" => Ok(Self::Sso),
            other => Err(format!("invalid mode: {other:?}")),
        }
    }
}

/// What a call wants to do, and where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestDescriptor {
    pub cluster: String,
    pub namespace: String,
    pub resource: String,
    pub action: String,
}

impl RequestDescriptor {
    #[must_use]
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Policy object key: `<cluster>:<resource>:<namespace>`.
    #[must_use]
    pub fn policy_object(&self) -> String {
        format!("{}:{}:{}", self.cluster, self.resource, self.namespace)
    }
}

/// A transport request that may name the cluster and namespace it targets.
pub trait ScopedRequest: Send + Sync {
    fn cluster(&self) -> Option<&str> {
        None
    }

    fn namespace(&self) -> Option<&str> {
        None
    }
}

impl ScopedRequest for () {}

/// Request handed to the gatekeeper: a ready descriptor, or a generic call
/// from which the descriptor is derived.
#[derive(Clone, Copy)]
pub enum RequestInput<'a> {
    Descriptor(&'a RequestDescriptor),
    Call {
        /// Full method path, e.g. `/workflow.WorkflowService/ListWorkflows`.
        method: &'a str,
        request: &'a dyn ScopedRequest,
    },
}

impl fmt::Debug for RequestInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(d) => f.debug_tuple("Descriptor").field(d).finish(),
            Self::Call { method, request } => f
                .debug_struct("Call")
                .field("method", method)
                .field("cluster", &request.cluster())
                .field("namespace", &request.namespace())
                .finish(),
        }
    }
}

/// Credential-bearing metadata of one call.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    /// `authorization` header values in arrival order.
    pub authorization: Vec<String>,
    /// Raw `cookie` header values in arrival order.
    pub cookies: Vec<String>,
}

impl CallMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization.push(value.into());
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, value: impl Into<String>) -> Self {
        self.cookies.push(value.into());
        self
    }
}

/// Service-account-like resource as supplied by the resource cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceAccount {
    pub name: String,
    pub namespace: String,
    pub annotations: BTreeMap<String, String>,
    /// Names of bound secrets, first one wins.
    pub secrets: Vec<String>,
}

/// Secret resource as supplied by the resource cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

/// RBAC rule attached to a service account through annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountRule {
    pub name: String,
    pub namespace: String,
    pub precedence: i64,
    pub predicate: String,
    pub secret_ref: Option<String>,
}

impl ServiceAccountRule {
    /// Read the rule annotations of `account`.
    ///
    /// Returns `None` when the account carries no rule. A precedence that is
    /// absent or not an integer counts as 0.
    #[must_use]
    pub fn from_service_account(account: &ServiceAccount) -> Option<Self> {
        let predicate = account.annotations.get(ANNOTATION_RBAC_RULE)?;
        let precedence = account
            .annotations
            .get(ANNOTATION_RBAC_RULE_PRECEDENCE)
            .and_then(|p| p.parse::<i64>().ok())
            .unwrap_or(0);
        Some(Self {
            name: account.name.clone(),
            namespace: account.namespace.clone(),
            precedence,
            predicate: predicate.clone(),
            secret_ref: account.secrets.first().cloned(),
        })
    }
}

/// The kinds of client carried by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Dynamic,
    Workflow,
    EventSource,
    Sensor,
    Kubernetes,
}

impl ClientKind {
    pub const ALL: [Self; 5] = [
        Self::Dynamic,
        Self::Workflow,
        Self::EventSource,
        Self::Sensor,
        Self::Kubernetes,
    ];
}

/// A client bound to one cluster and one credential.
pub trait ClusterClient: Send + Sync + fmt::Debug {
    fn kind(&self) -> ClientKind;

    fn rest_config(&self) -> &RestConfig;
}

/// One client per [`ClientKind`].
#[derive(Debug, Clone)]
pub struct ClusterClients {
    dynamic: Arc<dyn ClusterClient>,
    workflow: Arc<dyn ClusterClient>,
    event_source: Arc<dyn ClusterClient>,
    sensor: Arc<dyn ClusterClient>,
    kubernetes: Arc<dyn ClusterClient>,
}

impl ClusterClients {
    /// Build every client with `make`.
    pub fn from_fn(mut make: impl FnMut(ClientKind) -> Arc<dyn ClusterClient>) -> Self {
        Self {
            dynamic: make(ClientKind::Dynamic),
            workflow: make(ClientKind::Workflow),
            event_source: make(ClientKind::EventSource),
            sensor: make(ClientKind::Sensor),
            kubernetes: make(ClientKind::Kubernetes),
        }
    }

    #[must_use]
    pub fn get(&self, kind: ClientKind) -> &Arc<dyn ClusterClient> {
        match kind {
            ClientKind::Dynamic => &self.dynamic,
            ClientKind::Workflow => &self.workflow,
            ClientKind::EventSource => &self.event_source,
            ClientKind::Sensor => &self.sensor,
            ClientKind::Kubernetes => &self.kubernetes,
        }
    }

    #[must_use]
    pub fn dynamic(&self) -> &Arc<dyn ClusterClient> {
        &self.dynamic
    }

    #[must_use]
    pub fn workflow(&self) -> &Arc<dyn ClusterClient> {
        &self.workflow
    }

    #[must_use]
    pub fn event_source(&self) -> &Arc<dyn ClusterClient> {
        &self.event_source
    }

    #[must_use]
    pub fn sensor(&self) -> &Arc<dyn ClusterClient> {
        &self.sensor
    }

    #[must_use]
    pub fn kubernetes(&self) -> &Arc<dyn ClusterClient> {
        &self.kubernetes
    }
}

/// Clients for one cluster plus the credentials they were built from.
#[derive(Debug, Clone)]
pub struct ClientProfile {
    rest_config: RestConfig,
    clients: ClusterClients,
}

impl ClientProfile {
    #[must_use]
    pub fn new(rest_config: RestConfig, clients: ClusterClients) -> Self {
        Self {
            rest_config,
            clients,
        }
    }

    #[must_use]
    pub fn rest_config(&self) -> &RestConfig {
        &self.rest_config
    }

    #[must_use]
    pub fn clients(&self) -> &ClusterClients {
        &self.clients
    }
}

/// Result of a successful authorization, attached to the request scope.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    profile: Arc<ClientProfile>,
    claims: Claims,
}

impl AuthorizationContext {
    #[must_use]
    pub fn new(profile: Arc<ClientProfile>, claims: Claims) -> Self {
        Self { profile, claims }
    }

    #[must_use]
    pub fn profile(&self) -> &Arc<ClientProfile> {
        &self.profile
    }

    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    #[must_use]
    pub fn into_parts(self) -> (Arc<ClientProfile>, Claims) {
        (self.profile, self.claims)
    }
}

//! Configuration for the gatekeeper.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use gatekeeper_sdk::AuthMode;
use kubegate_security::constants::DEFAULT_PRIMARY_CLUSTER;
use serde::{Deserialize, Serialize};

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "KUBEGATE_";

/// Legacy switch for namespace delegation, honoured when loading.
pub const LEGACY_DELEGATION_ENV: &str = "SSO_DELEGATE_RBAC_TO_NAMESPACE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load gatekeeper config: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatekeeperConfig {
    /// Enabled auth modes. Must not be empty.
    pub modes: Vec<AuthMode>,
    /// Cluster the server runs in; always resolvable.
    pub primary_cluster: String,
    /// Namespace the server runs in.
    pub namespace: String,
    /// Home namespace of SSO rule accounts. Empty means `namespace`.
    pub sso_namespace: String,
    /// Single-namespace installation. Disables namespace delegation.
    pub namespaced: bool,
    /// Let rule accounts in the requested namespace outrank the home account.
    pub delegate_rbac_to_namespace: bool,
    /// Service account the server itself runs as.
    pub server_account: String,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            modes: vec![AuthMode::Client],
            primary_cluster: DEFAULT_PRIMARY_CLUSTER.to_owned(),
            namespace: "argo".to_owned(),
            sso_namespace: String::new(),
            namespaced: false,
            delegate_rbac_to_namespace: false,
            server_account: "argo-server".to_owned(),
        }
    }
}

impl GatekeeperConfig {
    /// Layered loading: defaults, then the YAML file (if any), then
    /// [`LEGACY_DELEGATION_ENV`], then `KUBEGATE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if a layer cannot be read or the merged
    /// result does not match the schema.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment
            .merge(
                Env::raw()
                    .only(&[LEGACY_DELEGATION_ENV])
                    .map(|_| "delegate_rbac_to_namespace".into()),
            )
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Home namespace of SSO rule accounts.
    #[must_use]
    pub fn effective_sso_namespace(&self) -> &str {
        if self.sso_namespace.is_empty() {
            &self.namespace
        } else {
            &self.sso_namespace
        }
    }
}

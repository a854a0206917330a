//! Deployment description: clusters, plugins and the resources the
//! gatekeeper reads through its cache.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use casbin_policy_plugin::{CasbinPolicyConfig, CasbinPolicyEngine};
use cel_rule_plugin::CelRuleEvaluator;
use figment::Figment;
use figment::providers::{Format, Yaml};
use gatekeeper::infra::{InMemoryResourceCache, RestProfileFactory};
use gatekeeper::{ClusterProfiles, Collaborators, Gatekeeper, GatekeeperConfig};
use gatekeeper_sdk::{ProfileFactory, Secret, ServiceAccount, SsoAuthorizer};
use kubegate_security::RestConfig;
use kubegate_security::constants::SECRET_TOKEN_KEY;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use static_sso_plugin::{StaticSsoAuthorizer, StaticSsoPluginConfig};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Deployment {
    /// API servers by cluster name. Must contain the primary cluster.
    pub clusters: BTreeMap<String, ClusterConfig>,
    /// Static SSO authorizer. Required when SSO mode is enabled.
    pub sso: Option<StaticSsoPluginConfig>,
    pub policy: CasbinPolicyConfig,
    pub service_accounts: Vec<ServiceAccount>,
    pub secrets: Vec<TokenSecret>,
}

/// Server credentials for one cluster.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub token: Option<SecretString>,
}

impl ClusterConfig {
    fn rest_config(&self) -> RestConfig {
        let mut config = RestConfig::new(self.host.clone());
        if let Some(username) = &self.username {
            config = config.with_username(username.clone());
        }
        if let Some(password) = &self.password {
            config = config.with_password(password.clone());
        }
        if let Some(token) = &self.token {
            config = config.with_bearer_token(token.clone());
        }
        config
    }
}

/// Service-account token secret.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSecret {
    pub name: String,
    pub namespace: String,
    pub token: SecretString,
}

impl From<TokenSecret> for Secret {
    fn from(s: TokenSecret) -> Self {
        Self {
            name: s.name,
            namespace: s.namespace,
            data: BTreeMap::from([(
                SECRET_TOKEN_KEY.to_owned(),
                s.token.expose_secret().as_bytes().to_vec(),
            )]),
        }
    }
}

impl Deployment {
    /// Read a deployment from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or does not match the schema.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        tracing::debug!(path = %path.display(), "loading deployment");
        Figment::new()
            .merge(Yaml::file_exact(path))
            .extract()
            .with_context(|| format!("failed to load deployment from {}", path.display()))
    }

    /// Wire the gatekeeper and its plugins.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary cluster is not described, a cluster
    /// profile cannot be built, the policy cannot be loaded, or the
    /// gatekeeper rejects the configuration.
    pub async fn build(self, config: &GatekeeperConfig) -> anyhow::Result<Gatekeeper> {
        let factory = RestProfileFactory;

        let Some(primary) = self.clusters.get(&config.primary_cluster) else {
            bail!(
                "deployment does not describe the primary cluster \"{}\"",
                config.primary_cluster
            );
        };
        let primary = factory
            .new_profile(primary.rest_config())
            .with_context(|| format!("cluster \"{}\"", config.primary_cluster))?;
        let mut clusters = ClusterProfiles::new(config.primary_cluster.clone(), Arc::new(primary));
        for (name, cluster) in &self.clusters {
            if *name == config.primary_cluster {
                continue;
            }
            let profile = factory
                .new_profile(cluster.rest_config())
                .with_context(|| format!("cluster \"{name}\""))?;
            clusters = clusters.with_cluster(name.clone(), Arc::new(profile));
        }

        let policy = CasbinPolicyEngine::from_config(&self.policy)
            .await
            .context("failed to load policy")?;
        let cache = InMemoryResourceCache::from_resources(
            self.service_accounts,
            self.secrets.into_iter().map(Secret::from),
        );
        let sso = self.sso.as_ref().map(|cfg| {
            Arc::new(StaticSsoAuthorizer::from_config(cfg)) as Arc<dyn SsoAuthorizer>
        });

        let collaborators = Collaborators {
            policy: Arc::new(policy),
            cache: Arc::new(cache),
            evaluator: Arc::new(CelRuleEvaluator::new()),
            profiles: Arc::new(factory),
            sso,
        };
        Gatekeeper::new(config, clusters, collaborators).context("invalid gatekeeper configuration")
    }
}

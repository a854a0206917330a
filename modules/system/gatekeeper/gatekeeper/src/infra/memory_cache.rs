//! Resource cache backed by concurrent in-memory maps.

use async_trait::async_trait;
use dashmap::DashMap;
use gatekeeper_sdk::{PluginError, ResourceCache, Secret, ServiceAccount};

type Key = (String, String);

/// Service accounts and secrets keyed by `(namespace, name)`.
///
/// Writers (an informer, a fixture loader) and the gatekeeper may use it
/// concurrently; each read sees a consistent object.
#[derive(Debug, Default)]
pub struct InMemoryResourceCache {
    service_accounts: DashMap<Key, ServiceAccount>,
    secrets: DashMap<Key, Secret>,
}

impl InMemoryResourceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_resources(
        service_accounts: impl IntoIterator<Item = ServiceAccount>,
        secrets: impl IntoIterator<Item = Secret>,
    ) -> Self {
        let cache = Self::new();
        for sa in service_accounts {
            cache.insert_service_account(sa);
        }
        for secret in secrets {
            cache.insert_secret(secret);
        }
        cache
    }

    /// Insert or replace a service account.
    pub fn insert_service_account(&self, sa: ServiceAccount) {
        self.service_accounts
            .insert((sa.namespace.clone(), sa.name.clone()), sa);
    }

    /// Insert or replace a secret.
    pub fn insert_secret(&self, secret: Secret) {
        self.secrets
            .insert((secret.namespace.clone(), secret.name.clone()), secret);
    }

    pub fn remove_service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
        self.service_accounts
            .remove(&(namespace.to_owned(), name.to_owned()))
            .map(|(_, sa)| sa)
    }
}

#[async_trait]
impl ResourceCache for InMemoryResourceCache {
    async fn list_service_accounts(
        &self,
        namespace: &str,
    ) -> Result<Vec<ServiceAccount>, PluginError> {
        Ok(self
            .service_accounts
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, PluginError> {
        self.secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PluginError::NotFound(format!("secret \"{namespace}/{name}\"")))
    }
}

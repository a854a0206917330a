//! Cluster client resolution.

use std::collections::HashMap;
use std::sync::Arc;

use gatekeeper_sdk::ClientProfile;

use super::error::DomainError;

/// Pre-built client profiles keyed by cluster name.
#[derive(Debug, Clone)]
pub struct ClusterProfiles {
    primary_cluster: String,
    primary: Arc<ClientProfile>,
    secondary: HashMap<String, Arc<ClientProfile>>,
}

impl ClusterProfiles {
    #[must_use]
    pub fn new(primary_cluster: impl Into<String>, primary: Arc<ClientProfile>) -> Self {
        Self {
            primary_cluster: primary_cluster.into(),
            primary,
            secondary: HashMap::new(),
        }
    }

    /// Register the profile of another cluster. The primary cannot be replaced.
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>, profile: Arc<ClientProfile>) -> Self {
        let cluster = cluster.into();
        if cluster == self.primary_cluster {
            tracing::warn!(cluster = %cluster, "ignoring profile for the primary cluster");
        } else {
            self.secondary.insert(cluster, profile);
        }
        self
    }

    #[must_use]
    pub fn primary_cluster(&self) -> &str {
        &self.primary_cluster
    }

    #[must_use]
    pub fn primary(&self) -> &Arc<ClientProfile> {
        &self.primary
    }

    /// # Errors
    ///
    /// Returns `ClusterNotFound` for a cluster without a profile.
    pub fn find(&self, cluster: &str) -> Result<Arc<ClientProfile>, DomainError> {
        if cluster == self.primary_cluster {
            return Ok(Arc::clone(&self.primary));
        }
        self.secondary
            .get(cluster)
            .cloned()
            .ok_or_else(|| DomainError::ClusterNotFound {
                cluster: cluster.to_owned(),
            })
    }

    /// Names of every resolvable cluster, primary first.
    pub fn clusters(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_cluster.as_str())
            .chain(self.secondary.keys().map(String::as_str))
    }
}

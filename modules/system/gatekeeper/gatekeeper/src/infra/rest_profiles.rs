//! Client profiles built from REST credentials.

use std::sync::Arc;

use gatekeeper_sdk::{
    ClientKind, ClientProfile, ClusterClient, ClusterClients, PluginError, ProfileFactory,
};
use kubegate_security::RestConfig;

/// Handle to one API group of a cluster, bound to one credential.
#[derive(Debug, Clone)]
pub struct RestClient {
    kind: ClientKind,
    rest_config: RestConfig,
}

impl RestClient {
    #[must_use]
    pub fn new(kind: ClientKind, rest_config: RestConfig) -> Self {
        Self { kind, rest_config }
    }
}

impl ClusterClient for RestClient {
    fn kind(&self) -> ClientKind {
        self.kind
    }

    fn rest_config(&self) -> &RestConfig {
        &self.rest_config
    }
}

/// Builds one [`RestClient`] per client kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestProfileFactory;

impl ProfileFactory for RestProfileFactory {
    fn new_profile(&self, rest_config: RestConfig) -> Result<ClientProfile, PluginError> {
        if rest_config.host().is_empty() {
            return Err(PluginError::InvalidInput(
                "cluster host must not be empty".to_owned(),
            ));
        }
        let clients = ClusterClients::from_fn(|kind| {
            Arc::new(RestClient::new(kind, rest_config.clone())) as Arc<dyn ClusterClient>
        });
        Ok(ClientProfile::new(rest_config, clients))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn every_client_shares_the_credential() {
        let profile = RestProfileFactory
            .new_profile(RestConfig::new("https://edge").with_username("u"))
            .unwrap();

        for kind in ClientKind::ALL {
            let client = profile.clients().get(kind);
            assert_eq!(client.kind(), kind);
            assert_eq!(client.rest_config().host(), "https://edge");
            assert_eq!(client.rest_config().username(), Some("u"));
        }
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = RestProfileFactory
            .new_profile(RestConfig::default())
            .unwrap_err();

        assert!(matches!(err, PluginError::InvalidInput(_)));
    }
}

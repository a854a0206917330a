//! `SsoAuthorizer` implementation for the static SSO plugin.

use async_trait::async_trait;
use gatekeeper_sdk::{PluginError, SsoAuthorizer};
use kubegate_security::Claims;

use super::service::Service;

#[async_trait]
impl SsoAuthorizer for Service {
    async fn authorize(&self, token: &str) -> Result<Claims, PluginError> {
        self.claims_for(token).ok_or_else(|| {
            tracing::debug!("static sso token rejected");
            PluginError::Unauthorized("invalid token".to_owned())
        })
    }

    fn is_rbac_enabled(&self) -> bool {
        self.rbac_enabled()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::StaticSsoPluginConfig;

    #[tokio::test]
    async fn plugin_trait_accept_all_succeeds() {
        let service = Service::from_config(&StaticSsoPluginConfig {
            rbac_enabled: true,
            ..StaticSsoPluginConfig::default()
        });
        let plugin: &dyn SsoAuthorizer = &service;

        assert!(plugin.authorize("Bearer v2:any").await.is_ok());
        assert!(plugin.is_rbac_enabled());
    }

    #[tokio::test]
    async fn plugin_trait_empty_token_unauthorized() {
        let service = Service::from_config(&StaticSsoPluginConfig::default());
        let plugin: &dyn SsoAuthorizer = &service;

        match plugin.authorize("Bearer v2:").await {
            Err(PluginError::Unauthorized(_)) => {}
            other => panic!("Expected Unauthorized, got: {other:?}"),
        }
    }
}

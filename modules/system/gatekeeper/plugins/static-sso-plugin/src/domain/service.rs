//! Service implementation for the static SSO authorizer plugin.

use std::collections::HashMap;

use kubegate_security::Claims;
use kubegate_security::constants::SSO_PREFIX;

use crate::config::{IdentityConfig, SsoMode, StaticSsoPluginConfig};

/// Static SSO authorizer.
///
/// - `accept_all`: Any non-empty token maps to the default identity
/// - `static_tokens`: Specific tokens map to specific identities
pub struct Service {
    rbac_enabled: bool,
    mode: SsoMode,
    default_identity: IdentityConfig,
    token_map: HashMap<String, IdentityConfig>,
}

impl Service {
    /// Create a service from plugin configuration.
    #[must_use]
    pub fn from_config(cfg: &StaticSsoPluginConfig) -> Self {
        let token_map = cfg
            .tokens
            .iter()
            .map(|m| (m.token.clone(), m.identity.clone()))
            .collect();

        Self {
            rbac_enabled: cfg.rbac_enabled,
            mode: cfg.mode.clone(),
            default_identity: cfg.default_identity.clone(),
            token_map,
        }
    }

    #[must_use]
    pub fn rbac_enabled(&self) -> bool {
        self.rbac_enabled
    }

    /// Claims for `authorization` (with or without its `Bearer v2:` prefix).
    ///
    /// Returns `None` if the token is empty or, in `static_tokens` mode, unknown.
    #[must_use]
    pub fn claims_for(&self, authorization: &str) -> Option<Claims> {
        let token = authorization
            .strip_prefix(SSO_PREFIX)
            .unwrap_or(authorization);
        if token.is_empty() {
            return None;
        }

        let identity = match &self.mode {
            SsoMode::AcceptAll => &self.default_identity,
            SsoMode::StaticTokens => self.token_map.get(token)?,
        };

        Some(build_claims(identity))
    }
}

fn build_claims(identity: &IdentityConfig) -> Claims {
    Claims::builder()
        .issuer(&identity.issuer)
        .subject(&identity.subject)
        .email(&identity.email)
        .email_verified(!identity.email.is_empty())
        .groups(identity.groups.clone())
        .build()
}

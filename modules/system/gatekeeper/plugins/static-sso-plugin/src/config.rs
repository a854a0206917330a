//! Configuration for the static SSO authorizer plugin.

use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticSsoPluginConfig {
    /// Map identities onto service accounts by rule.
    pub rbac_enabled: bool,

    /// Authorization mode.
    pub mode: SsoMode,

    /// Identity returned in `accept_all` mode.
    pub default_identity: IdentityConfig,

    /// Static token-to-identity mappings for `static_tokens` mode.
    pub tokens: Vec<TokenMapping>,
}

impl Default for StaticSsoPluginConfig {
    fn default() -> Self {
        Self {
            rbac_enabled: false,
            mode: SsoMode::AcceptAll,
            default_identity: IdentityConfig::default(),
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SsoMode {
    /// Accept any non-empty token and return the default identity.
    #[default]
    AcceptAll,
    /// Map specific tokens to specific identities.
    StaticTokens,
}

/// Claims returned for a token.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub issuer: String,
    pub subject: String,
    pub email: String,
    pub groups: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            issuer: "kubegate-static-sso".to_owned(),
            subject: "anonymous-sso-user".to_owned(),
            email: String::new(),
            groups: Vec::new(),
        }
    }
}

/// Maps a static token to a specific identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenMapping {
    /// The token value after `Bearer v2:`.
    pub token: String,
    pub identity: IdentityConfig,
}

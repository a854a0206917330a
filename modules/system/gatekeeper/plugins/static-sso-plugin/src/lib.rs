#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static SSO Authorizer Plugin
//!
//! Maps single sign-on tokens to claims from configuration, for development
//! and testing without an identity provider.
//!
//! ## Modes
//!
//! - **`accept_all`** (default): Accepts any non-empty token, returns the configured
//!   default identity.
//! - **`static_tokens`**: Maps specific tokens to specific identities.
//!
//! Tokens are matched without their `Bearer v2:` prefix.
//!
//! ## Configuration
//!
//! ```yaml
//! rbac_enabled: true
//! mode: static_tokens
//! tokens:
//!   - token: "alice"
//!     identity:
//!       subject: "alice"
//!       email: "alice@example.com"
//!       groups: ["my-group"]
//! ```

pub mod config;
pub mod domain;

pub use config::StaticSsoPluginConfig;
pub use domain::service::Service as StaticSsoAuthorizer;

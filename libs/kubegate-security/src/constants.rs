//! Well-known names shared by the gatekeeper crates.

/// Cluster name used when no primary cluster is configured.
pub const DEFAULT_PRIMARY_CLUSTER: &str = "default";

/// Header and cookie name carrying the caller's credential.
pub const AUTHORIZATION: &str = "authorization";

/// Scheme prefix of a bearer credential.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Scheme prefix of a basic credential.
pub const BASIC_PREFIX: &str = "Basic ";

/// Prefix of tokens minted by the SSO login flow.
pub const SSO_PREFIX: &str = "Bearer v2:";

/// Service-account annotation holding the RBAC rule predicate.
pub const ANNOTATION_RBAC_RULE: &str = "workflows.argoproj.io/rbac-rule";

/// Service-account annotation holding the RBAC rule precedence.
pub const ANNOTATION_RBAC_RULE_PRECEDENCE: &str = "workflows.argoproj.io/rbac-rule-precedence";

/// Secret data key holding a service-account token.
pub const SECRET_TOKEN_KEY: &str = "token";

//! Domain errors for the gatekeeper.

use gatekeeper_sdk::GatekeeperError;
use kubegate_security::CredentialError;

/// Message of every permission failure on the SSO path.
pub const NOT_ALLOWED: &str = "not allowed";

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("no enabled auth mode matches the presented credentials")]
    NotAuthenticated,

    #[error("token rejected: {0}")]
    InvalidToken(String),

    #[error("invalid gatekeeper configuration: {0}")]
    InvalidConfig(String),

    #[error("cluster \"{cluster}\" not found")]
    ClusterNotFound { cluster: String },

    #[error("no service account rule matches")]
    NoMatchingRule,

    #[error("failed to list service accounts in \"{namespace}\": {reason}")]
    ListServiceAccounts { namespace: String, reason: String },

    #[error("service account \"{namespace}/{name}\" does not have a secret")]
    MissingSecret { namespace: String, name: String },

    #[error("failed to read secret \"{namespace}/{name}\": {reason}")]
    SecretUnavailable {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("failed to build client profile: {0}")]
    Profile(String),

    #[error("not allowed to {action} on {object} as {subject}")]
    AccessDenied {
        subject: String,
        object: String,
        action: String,
    },

    /// SSO path denial; details are logged, never returned.
    #[error("not allowed")]
    NotAllowed,

    #[error("policy engine error: {0}")]
    PolicyEngine(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<DomainError> for GatekeeperError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotAuthenticated | DomainError::InvalidToken(_) => {
                Self::Unauthenticated(e.to_string())
            }
            DomainError::NotAllowed | DomainError::NoMatchingRule => {
                Self::PermissionDenied(NOT_ALLOWED.to_owned())
            }
            DomainError::AccessDenied { .. } => Self::PermissionDenied(e.to_string()),
            DomainError::InvalidConfig(_)
            | DomainError::ClusterNotFound { .. }
            | DomainError::ListServiceAccounts { .. }
            | DomainError::MissingSecret { .. }
            | DomainError::SecretUnavailable { .. }
            | DomainError::Profile(_)
            | DomainError::PolicyEngine(_)
            | DomainError::Credential(_)
            | DomainError::Internal(_) => Self::Internal(e.to_string()),
        }
    }
}

//! Error types for the gatekeeper module.

use thiserror::Error;

/// Errors surfaced to callers of [`crate::GatekeeperClient`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatekeeperError {
    /// No usable credential, or the identity authorizer rejected it.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The call is not permitted.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatekeeperError {
    /// Message without the class prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(msg) | Self::PermissionDenied(msg) | Self::Internal(msg) => msg,
        }
    }
}

/// Errors returned by collaborator plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The credential was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The plugin rejected its input (bad expression, bad policy).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

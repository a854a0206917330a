use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use secrecy::{ExposeSecret, SecretString};

use crate::claims::Claims;
use crate::constants::{BASIC_PREFIX, BEARER_PREFIX};

const SA_NAME_CLAIM: &str = "kubernetes.io/serviceaccount/service-account.name";
const SA_NAMESPACE_CLAIM: &str = "kubernetes.io/serviceaccount/namespace";

/// Errors raised while turning an authorization value into REST credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("unsupported authorization scheme")]
    UnsupportedScheme,

    #[error("error parsing basic authentication: {0}")]
    InvalidBasicAuth(String),

    #[error("error parsing bearer token claims: {0}")]
    InvalidToken(String),
}

/// Connection settings and credentials for one cluster API server.
///
/// Tokens and passwords are wrapped in `SecretString` so `Debug` redacts them.
#[derive(Debug, Clone, Default)]
pub struct RestConfig {
    host: String,
    username: Option<String>,
    password: Option<SecretString>,
    bearer_token: Option<SecretString>,
}

impl RestConfig {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<SecretString>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<SecretString>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }

    /// Derive the credentials a caller presented in an `Authorization` value.
    ///
    /// The result keeps this config's host and drops its own credentials.
    ///
    /// # Errors
    ///
    /// - `UnsupportedScheme` unless the value is `Bearer ...` or `Basic ...`
    /// - `InvalidBasicAuth` if the basic credential is not `base64(user:password)`
    pub fn for_authorization(&self, authorization: &str) -> Result<Self, CredentialError> {
        if let Some(encoded) = authorization.strip_prefix(BASIC_PREFIX) {
            let (username, password) = decode_basic(encoded)?;
            return Ok(Self::new(self.host.clone())
                .with_username(username)
                .with_password(password));
        }
        if let Some(token) = authorization.strip_prefix(BEARER_PREFIX) {
            return Ok(Self::new(self.host.clone()).with_bearer_token(token.to_owned()));
        }
        Err(CredentialError::UnsupportedScheme)
    }

    /// Best-effort identity of these credentials.
    ///
    /// A username yields claims with that subject. A bearer token is read as
    /// a JWT without verifying its signature; the cluster verifies it on use.
    /// Returns `Ok(None)` when the credentials carry no identity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the bearer token is not a decodable JWT.
    pub fn claim_set(&self) -> Result<Option<Claims>, CredentialError> {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return Ok(Some(Claims::builder().subject(username).build()));
        }
        match self.bearer_token.as_ref().map(ExposeSecret::expose_secret) {
            Some(token) if !token.is_empty() => unverified_claims(token).map(Some),
            _ => Ok(None),
        }
    }
}

fn decode_basic(encoded: &str) -> Result<(String, String), CredentialError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CredentialError::InvalidBasicAuth(e.to_string()))?;
    let decoded =
        String::from_utf8(bytes).map_err(|e| CredentialError::InvalidBasicAuth(e.to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| CredentialError::InvalidBasicAuth("missing ':' separator".to_owned()))?;
    Ok((username.to_owned(), password.to_owned()))
}

fn unverified_claims(token: &str) -> Result<Claims, CredentialError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(CredentialError::InvalidToken("expected three segments".to_owned())),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| CredentialError::InvalidToken(e.to_string()))?;
    let raw: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| CredentialError::InvalidToken(e.to_string()))?;

    let mut claims: Claims = serde_json::from_value(raw.clone())
        .map_err(|e| CredentialError::InvalidToken(e.to_string()))?;
    if claims.service_account_name().is_none()
        && let Some(name) = raw.get(SA_NAME_CLAIM).and_then(serde_json::Value::as_str)
    {
        claims.set_service_account_name(name);
    }
    if claims.service_account_namespace().is_none()
        && let Some(namespace) = raw.get(SA_NAMESPACE_CLAIM).and_then(serde_json::Value::as_str)
    {
        claims.set_service_account_namespace(namespace);
    }
    Ok(claims)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn jwt(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn bearer_authorization_replaces_credentials() {
        let primary = RestConfig::new("https://kubernetes.default.svc").with_username("admin");

        let derived = primary.for_authorization("Bearer abc").unwrap();

        assert_eq!(derived.host(), "https://kubernetes.default.svc");
        assert!(derived.username().is_none());
        assert_eq!(
            derived.bearer_token().map(ExposeSecret::expose_secret),
            Some("abc")
        );
    }

    #[test]
    fn empty_bearer_authorization_is_accepted() {
        let derived = RestConfig::new("h").for_authorization("Bearer ").unwrap();

        assert_eq!(
            derived.bearer_token().map(ExposeSecret::expose_secret),
            Some("")
        );
    }

    #[test]
    fn basic_authorization_sets_username_and_password() {
        let encoded = STANDARD.encode("alice:s3cret");
        let derived = RestConfig::new("h")
            .for_authorization(&format!("Basic {encoded}"))
            .unwrap();

        assert_eq!(derived.username(), Some("alice"));
        assert_eq!(
            derived.password().map(ExposeSecret::expose_secret),
            Some("s3cret")
        );
        assert!(derived.bearer_token().is_none());
    }

    #[test]
    fn malformed_basic_authorization_is_rejected() {
        let encoded = STANDARD.encode("no-separator");
        let err = RestConfig::new("h")
            .for_authorization(&format!("Basic {encoded}"))
            .unwrap_err();

        assert!(matches!(err, CredentialError::InvalidBasicAuth(_)));
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = RestConfig::new("h").for_authorization("invalid").unwrap_err();

        assert!(matches!(err, CredentialError::UnsupportedScheme));
    }

    #[test]
    fn claim_set_from_username() {
        let claims = RestConfig::new("h")
            .with_username("my-username")
            .claim_set()
            .unwrap()
            .unwrap();

        assert_eq!(claims.subject(), "my-username");
    }

    #[test]
    fn claim_set_without_credentials_is_none() {
        assert!(RestConfig::new("h").claim_set().unwrap().is_none());
        assert!(
            RestConfig::new("h")
                .with_bearer_token(String::new())
                .claim_set()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn claim_set_from_service_account_token() {
        let token = jwt(&serde_json::json!({
            "iss": "kubernetes/serviceaccount",
            "sub": "system:serviceaccount:argo:argo-server",
            "kubernetes.io/serviceaccount/namespace": "argo",
            "kubernetes.io/serviceaccount/service-account.name": "argo-server",
        }));

        let claims = RestConfig::new("h")
            .with_bearer_token(token)
            .claim_set()
            .unwrap()
            .unwrap();

        assert_eq!(claims.subject(), "system:serviceaccount:argo:argo-server");
        assert_eq!(claims.service_account_name(), Some("argo-server"));
        assert_eq!(claims.service_account_namespace(), Some("argo"));
    }

    #[test]
    fn claim_set_from_opaque_token_fails() {
        let err = RestConfig::new("h")
            .with_bearer_token("not-a-jwt".to_owned())
            .claim_set()
            .unwrap_err();

        assert!(matches!(err, CredentialError::InvalidToken(_)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = RestConfig::new("h").with_bearer_token("top-secret".to_owned());

        assert!(!format!("{config:?}").contains("top-secret"));
    }
}

//! Auth-mode selection.

use std::collections::BTreeSet;

use gatekeeper_sdk::AuthMode;
use kubegate_security::constants::{BASIC_PREFIX, BEARER_PREFIX, SSO_PREFIX};

use super::error::DomainError;

/// The set of enabled auth modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modes(BTreeSet<AuthMode>);

impl Modes {
    /// # Errors
    ///
    /// Returns `InvalidConfig` if no mode is enabled.
    pub fn new(modes: impl IntoIterator<Item = AuthMode>) -> Result<Self, DomainError> {
        let set: BTreeSet<AuthMode> = modes.into_iter().collect();
        if set.is_empty() {
            return Err(DomainError::InvalidConfig(
                "at least one auth mode must be enabled".to_owned(),
            ));
        }
        Ok(Self(set))
    }

    #[must_use]
    pub fn contains(&self, mode: AuthMode) -> bool {
        self.0.contains(&mode)
    }

    pub fn iter(&self) -> impl Iterator<Item = AuthMode> + '_ {
        self.0.iter().copied()
    }

    /// Enabled mode that recognises `token`, if any.
    ///
    /// SSO tokens are also valid bearer tokens, so SSO is checked first.
    /// Server mode accepts anything, including no credential at all.
    #[must_use]
    pub fn classify(&self, token: &str) -> Option<AuthMode> {
        if self.contains(AuthMode::Sso) && token.starts_with(SSO_PREFIX) {
            Some(AuthMode::Sso)
        } else if self.contains(AuthMode::Client)
            && (token.starts_with(BEARER_PREFIX) || token.starts_with(BASIC_PREFIX))
        {
            Some(AuthMode::Client)
        } else if self.contains(AuthMode::Server) {
            Some(AuthMode::Server)
        } else {
            None
        }
    }

    /// First candidate recognised by an enabled mode.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` if no candidate matches.
    pub fn select<I, S>(&self, candidates: I) -> Result<(AuthMode, S), DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .find_map(|token| self.classify(token.as_ref()).map(|mode| (mode, token)))
            .ok_or(DomainError::NotAuthenticated)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn modes(m: &[AuthMode]) -> Modes {
        Modes::new(m.iter().copied()).unwrap()
    }

    #[test]
    fn empty_modes_are_rejected() {
        assert!(matches!(
            Modes::new([]),
            Err(DomainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn classify_prefers_sso_over_client() {
        let all = modes(&[AuthMode::Client, AuthMode::Server, AuthMode::Sso]);

        assert_eq!(all.classify("Bearer v2:xyz"), Some(AuthMode::Sso));
        assert_eq!(all.classify("Bearer xyz"), Some(AuthMode::Client));
        assert_eq!(all.classify("Basic eHl6"), Some(AuthMode::Client));
        assert_eq!(all.classify(""), Some(AuthMode::Server));
    }

    #[test]
    fn sso_token_is_client_token_when_sso_disabled() {
        let client = modes(&[AuthMode::Client]);

        assert_eq!(client.classify("Bearer v2:xyz"), Some(AuthMode::Client));
        assert_eq!(client.classify("invalid"), None);
    }

    #[test]
    fn server_accepts_anything() {
        let server = modes(&[AuthMode::Server]);

        assert_eq!(server.classify("whatever"), Some(AuthMode::Server));
    }

    #[test]
    fn select_stops_at_first_match() {
        let sso = modes(&[AuthMode::Sso]);

        let (mode, token) = sso
            .select(["Bearer old", "Bearer v2:a", "Bearer v2:b"])
            .unwrap();

        assert_eq!(mode, AuthMode::Sso);
        assert_eq!(token, "Bearer v2:a");
    }

    #[test]
    fn select_without_match_is_unauthenticated() {
        let sso = modes(&[AuthMode::Sso]);

        assert!(matches!(
            sso.select(["Bearer "]),
            Err(DomainError::NotAuthenticated)
        ));
    }
}

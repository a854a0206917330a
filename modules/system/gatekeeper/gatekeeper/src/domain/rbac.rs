//! Rule-based service-account selection for SSO identities.
//!
//! Rule accounts carry a predicate over the caller's claims and a precedence.
//! The highest-precedence account whose predicate holds acts for the caller.
//! With namespace delegation enabled, a matching account in the requested
//! namespace replaces the home account when it strictly outranks it.

use std::sync::Arc;

use gatekeeper_sdk::{
    ClientProfile, ProfileFactory, ResourceCache, RuleEvaluator, ServiceAccountRule,
};
use kubegate_security::constants::{BEARER_PREFIX, SECRET_TOKEN_KEY};
use kubegate_security::{Claims, RestConfig};

use super::error::DomainError;

/// Namespace delegation settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct DelegationPolicy {
    /// Home namespace of rule accounts.
    pub sso_namespace: String,
    /// Single-namespace installation.
    pub namespaced: bool,
    /// Delegation toggle.
    pub enabled: bool,
}

impl DelegationPolicy {
    /// Whether accounts in `namespace` may outrank the home account.
    #[must_use]
    pub fn allows(&self, namespace: &str) -> bool {
        !self.namespaced && self.enabled && !namespace.is_empty() && namespace != self.sso_namespace
    }
}

/// Outcome of one selection, before credentials are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub login: ServiceAccountRule,
    pub delegate: ServiceAccountRule,
    pub delegation_allowed: bool,
    pub delegated: bool,
}

pub struct ServiceAccountSelector {
    cache: Arc<dyn ResourceCache>,
    evaluator: Arc<dyn RuleEvaluator>,
    factory: Arc<dyn ProfileFactory>,
    delegation: DelegationPolicy,
}

impl ServiceAccountSelector {
    #[must_use]
    pub fn new(
        cache: Arc<dyn ResourceCache>,
        evaluator: Arc<dyn RuleEvaluator>,
        factory: Arc<dyn ProfileFactory>,
        delegation: DelegationPolicy,
    ) -> Self {
        Self {
            cache,
            evaluator,
            factory,
            delegation,
        }
    }

    /// Highest-precedence rule in `namespace` whose predicate holds for
    /// `claims`. Equal precedences are ordered by account name.
    ///
    /// # Errors
    ///
    /// - `ListServiceAccounts` if the cache cannot be read
    /// - `Internal` if a predicate fails to evaluate
    /// - `NoMatchingRule` if no predicate holds
    #[tracing::instrument(skip_all, fields(namespace = %namespace))]
    pub async fn find_matching(
        &self,
        claims: &Claims,
        namespace: &str,
    ) -> Result<ServiceAccountRule, DomainError> {
        let accounts = self
            .cache
            .list_service_accounts(namespace)
            .await
            .map_err(|e| DomainError::ListServiceAccounts {
                namespace: namespace.to_owned(),
                reason: e.to_string(),
            })?;

        let mut rules: Vec<ServiceAccountRule> = accounts
            .iter()
            .filter_map(ServiceAccountRule::from_service_account)
            .collect();
        rules.sort_by(|a, b| {
            b.precedence
                .cmp(&a.precedence)
                .then_with(|| a.name.cmp(&b.name))
        });

        let input = claims.to_json()?;
        for rule in rules {
            let allow = self
                .evaluator
                .eval_bool(&rule.predicate, &input)
                .map_err(|e| {
                    DomainError::Internal(format!(
                        "failed to evaluate rule of \"{}/{}\": {e}",
                        rule.namespace, rule.name
                    ))
                })?;
            if allow {
                tracing::debug!(
                    service_account = %rule.name,
                    precedence = rule.precedence,
                    "rule matched"
                );
                return Ok(rule);
            }
        }
        Err(DomainError::NoMatchingRule)
    }

    /// Choose the account acting for `claims` on a call into `namespace`,
    /// and write one audit entry for the choice.
    ///
    /// # Errors
    ///
    /// Fails if no rule in the home namespace matches. A failed lookup in the
    /// requested namespace only disables delegation.
    pub async fn select(&self, claims: &Claims, namespace: &str) -> Result<Selection, DomainError> {
        let login = self
            .find_matching(claims, &self.delegation.sso_namespace)
            .await?;

        let delegation_allowed = self.delegation.allows(namespace);
        let mut delegate = None;
        if delegation_allowed {
            match self.find_matching(claims, namespace).await {
                Ok(candidate) if candidate.precedence > login.precedence => {
                    delegate = Some(candidate);
                }
                Ok(_) => {}
                Err(e) => tracing::info!(
                    error = %e,
                    namespace = %namespace,
                    "no delegate service account in request namespace"
                ),
            }
        }
        let delegated = delegate.is_some();
        let delegate = delegate.unwrap_or_else(|| login.clone());

        tracing::info!(
            service_account = %delegate.name,
            login_service_account = %login.name,
            subject = %claims.subject(),
            email = claims.email().unwrap_or_default(),
            sso_delegation_allowed = delegation_allowed,
            sso_delegated = delegated,
            "selected SSO RBAC service account for user"
        );

        Ok(Selection {
            login,
            delegate,
            delegation_allowed,
            delegated,
        })
    }

    /// `Bearer <token>` taken from the first secret bound to `rule`'s account.
    ///
    /// # Errors
    ///
    /// - `MissingSecret` if the account has no bound secret
    /// - `SecretUnavailable` if the secret cannot be read
    pub async fn bearer_for(&self, rule: &ServiceAccountRule) -> Result<String, DomainError> {
        let secret_name = rule
            .secret_ref
            .as_deref()
            .ok_or_else(|| DomainError::MissingSecret {
                namespace: rule.namespace.clone(),
                name: rule.name.clone(),
            })?;
        let secret = self
            .cache
            .get_secret(&rule.namespace, secret_name)
            .await
            .map_err(|e| DomainError::SecretUnavailable {
                namespace: rule.namespace.clone(),
                name: secret_name.to_owned(),
                reason: e.to_string(),
            })?;
        let token = secret
            .data
            .get(SECRET_TOKEN_KEY)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        Ok(format!("{BEARER_PREFIX}{token}"))
    }

    /// Select the acting account and build its client profile from
    /// `primary`'s host. Records the account name on `claims`.
    ///
    /// # Errors
    ///
    /// Any failure of [`Self::select`], [`Self::bearer_for`] or profile construction.
    pub async fn authorize(
        &self,
        claims: &mut Claims,
        namespace: &str,
        primary: &RestConfig,
    ) -> Result<Arc<ClientProfile>, DomainError> {
        let selection = self.select(claims, namespace).await?;
        let authorization = self.bearer_for(&selection.delegate).await?;
        let rest_config = primary.for_authorization(&authorization)?;
        let profile = self
            .factory
            .new_profile(rest_config)
            .map_err(|e| DomainError::Profile(e.to_string()))?;
        claims.set_service_account_name(selection.delegate.name);
        Ok(Arc::new(profile))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use cel_rule_plugin::CelRuleEvaluator;

    use super::*;
    use crate::infra::{InMemoryResourceCache, RestProfileFactory};
    use crate::testing::{
        GroupRuleEvaluator, ListedInOrder, empty_token_secret, fixture_cache, rule_account,
    };

    fn selector(cache: impl ResourceCache + 'static, enabled: bool) -> ServiceAccountSelector {
        with_evaluator(cache, Arc::new(GroupRuleEvaluator), enabled)
    }

    fn cel_selector(cache: impl ResourceCache + 'static) -> ServiceAccountSelector {
        with_evaluator(cache, Arc::new(CelRuleEvaluator::new()), false)
    }

    fn with_evaluator(
        cache: impl ResourceCache + 'static,
        evaluator: Arc<dyn RuleEvaluator>,
        enabled: bool,
    ) -> ServiceAccountSelector {
        ServiceAccountSelector::new(
            Arc::new(cache),
            evaluator,
            Arc::new(RestProfileFactory),
            DelegationPolicy {
                sso_namespace: "my-ns".to_owned(),
                namespaced: false,
                enabled,
            },
        )
    }

    fn claims(groups: &[&str]) -> Claims {
        Claims::builder()
            .subject("my-sub")
            .groups(groups.iter().map(|g| (*g).to_owned()).collect())
            .build()
    }

    #[test]
    fn delegation_conditions() {
        let policy = DelegationPolicy {
            sso_namespace: "my-ns".to_owned(),
            namespaced: false,
            enabled: true,
        };

        assert!(policy.allows("user1-ns"));
        assert!(!policy.allows(""));
        assert!(!policy.allows("my-ns"));
        let disabled = DelegationPolicy {
            enabled: false,
            ..policy.clone()
        };
        let namespaced = DelegationPolicy {
            namespaced: true,
            ..policy
        };
        assert!(!disabled.allows("user1-ns"));
        assert!(!namespaced.allows("user1-ns"));
    }

    #[tokio::test]
    async fn highest_precedence_match_wins() {
        let s = selector(fixture_cache(), false);

        let rule = s
            .find_matching(&claims(&["my-group", "other-group"]), "my-ns")
            .await
            .unwrap();

        assert_eq!(rule.name, "my-sa");
    }

    #[tokio::test]
    async fn precedence_wins_over_listing_order() {
        let cache = ListedInOrder::new(
            vec![
                rule_account("low-sa", "ns", "true", "0", Some("s")),
                rule_account("high-sa", "ns", "true", "5", Some("s")),
            ],
            [empty_token_secret("s", "ns")],
        );
        let s = selector(cache, false);

        let rule = s.find_matching(&claims(&[]), "ns").await.unwrap();

        assert_eq!(rule.name, "high-sa");
    }

    #[tokio::test]
    async fn lower_precedence_match_when_higher_fails() {
        let s = selector(fixture_cache(), false);

        let rule = s
            .find_matching(&claims(&["other-group"]), "my-ns")
            .await
            .unwrap();

        assert_eq!(rule.name, "my-other-sa");
    }

    #[tokio::test]
    async fn equal_precedence_breaks_ties_by_name() {
        let cache = InMemoryResourceCache::new();
        cache.insert_service_account(rule_account("b-sa", "ns", "true", "1", Some("s")));
        cache.insert_service_account(rule_account("a-sa", "ns", "true", "1", Some("s")));
        let s = selector(cache, false);

        let rule = s.find_matching(&claims(&[]), "ns").await.unwrap();

        assert_eq!(rule.name, "a-sa");
    }

    #[tokio::test]
    async fn no_match_is_reported() {
        let s = selector(fixture_cache(), false);

        let err = s.find_matching(&claims(&[]), "my-ns").await.unwrap_err();

        assert!(matches!(err, DomainError::NoMatchingRule));
    }

    #[tokio::test]
    async fn broken_predicate_fails_selection() {
        let cache = InMemoryResourceCache::new();
        cache.insert_service_account(rule_account("sa", "ns", "groups ~~ 1", "0", Some("s")));
        let s = selector(cache, false);

        let err = s.find_matching(&claims(&[]), "ns").await.unwrap_err();

        assert!(matches!(err, DomainError::Internal(_)));
    }

    #[tokio::test]
    async fn rule_on_unasserted_claim_falls_through() {
        let cache = InMemoryResourceCache::from_resources(
            [
                rule_account("admin-sa", "argo", "email == 'root@example.com'", "10", Some("s")),
                rule_account("viewer-sa", "argo", "'viewers' in groups", "0", Some("s")),
            ],
            [empty_token_secret("s", "argo")],
        );
        let s = cel_selector(cache);
        let bob = Claims::builder()
            .subject("bob")
            .groups(vec!["viewers".to_owned()])
            .build();

        let rule = s.find_matching(&bob, "argo").await.unwrap();

        assert_eq!(rule.name, "viewer-sa");
    }

    #[tokio::test]
    async fn malformed_rule_is_an_error() {
        let cache = InMemoryResourceCache::new();
        cache.insert_service_account(rule_account("sa", "ns", "'admins' in groups &&", "0", None));
        let s = cel_selector(cache);

        let err = s.find_matching(&claims(&["admins"]), "ns").await.unwrap_err();

        assert!(matches!(err, DomainError::Internal(_)));
    }

    #[tokio::test]
    async fn delegate_must_strictly_outrank_login() {
        let s = selector(fixture_cache(), true);
        let c = claims(&["my-group"]);

        let user1 = s.select(&c, "user1-ns").await.unwrap();
        let user3 = s.select(&c, "user3-ns").await.unwrap();

        assert_eq!(user1.delegate.name, "user1-sa");
        assert!(user1.delegated);
        assert_eq!(user3.delegate.name, "my-sa");
        assert!(user3.delegation_allowed);
        assert!(!user3.delegated);
    }

    #[tokio::test]
    async fn delegation_lookup_failure_keeps_login_account() {
        let s = selector(fixture_cache(), true);

        let sel = s.select(&claims(&["my-group"]), "empty-ns").await.unwrap();

        assert_eq!(sel.delegate.name, "my-sa");
        assert!(!sel.delegated);
    }

    #[tokio::test]
    async fn account_without_secret_is_rejected() {
        let s = selector(fixture_cache(), false);
        let rule = ServiceAccountRule {
            name: "lonely".to_owned(),
            namespace: "my-ns".to_owned(),
            precedence: 0,
            predicate: "true".to_owned(),
            secret_ref: None,
        };

        let err = s.bearer_for(&rule).await.unwrap_err();

        assert!(matches!(err, DomainError::MissingSecret { .. }));
    }

    #[tokio::test]
    async fn authorize_records_service_account_on_claims() {
        let s = selector(fixture_cache(), false);
        let mut c = claims(&["my-group"]);

        let profile = s
            .authorize(&mut c, "", &RestConfig::new("https://primary"))
            .await
            .unwrap();

        assert_eq!(c.service_account_name(), Some("my-sa"));
        assert_eq!(profile.rest_config().host(), "https://primary");
        assert!(profile.rest_config().bearer_token().is_some());
    }
}

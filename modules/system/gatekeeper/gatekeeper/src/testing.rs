//! Test doubles shared by the crate's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gatekeeper_sdk::{
    ClientProfile, PluginError, PolicyEngine, ProfileFactory, ResourceCache, RuleEvaluator,
    Secret, ServiceAccount, SsoAuthorizer,
};
use kubegate_security::constants::{ANNOTATION_RBAC_RULE, ANNOTATION_RBAC_RULE_PRECEDENCE};
use kubegate_security::{Claims, RestConfig};

use crate::infra::{InMemoryResourceCache, RestProfileFactory};

pub fn profile(host: &str) -> Arc<ClientProfile> {
    Arc::new(
        RestProfileFactory
            .new_profile(RestConfig::new(format!("https://{host}")).with_username("my-username"))
            .unwrap(),
    )
}

pub fn rule_account(
    name: &str,
    namespace: &str,
    rule: &str,
    precedence: &str,
    secret: Option<&str>,
) -> ServiceAccount {
    ServiceAccount {
        name: name.to_owned(),
        namespace: namespace.to_owned(),
        annotations: [
            (ANNOTATION_RBAC_RULE.to_owned(), rule.to_owned()),
            (
                ANNOTATION_RBAC_RULE_PRECEDENCE.to_owned(),
                precedence.to_owned(),
            ),
        ]
        .into_iter()
        .collect(),
        secrets: secret.into_iter().map(str::to_owned).collect(),
    }
}

pub fn empty_token_secret(name: &str, namespace: &str) -> Secret {
    Secret {
        name: name.to_owned(),
        namespace: namespace.to_owned(),
        data: [("token".to_owned(), Vec::new())].into_iter().collect(),
    }
}

/// Rule accounts: `my-ns` holds `my-sa` (precedence 1) and `my-other-sa`
/// (precedence 0); `user{1,2,3}-ns` each hold one account at precedence
/// 2, 0 and 1.
pub fn fixture_cache() -> InMemoryResourceCache {
    InMemoryResourceCache::from_resources(
        [
            rule_account("my-other-sa", "my-ns", "'other-group' in groups", "0", Some("my-secret")),
            rule_account("my-sa", "my-ns", "'my-group' in groups", "1", Some("my-secret")),
            rule_account("user1-sa", "user1-ns", "'my-group' in groups", "2", Some("user-secret")),
            rule_account("user2-sa", "user2-ns", "'my-group' in groups", "0", Some("user-secret")),
            rule_account("user3-sa", "user3-ns", "'my-group' in groups", "1", Some("user-secret")),
        ],
        [
            empty_token_secret("my-secret", "my-ns"),
            empty_token_secret("user-secret", "user1-ns"),
            empty_token_secret("user-secret", "user2-ns"),
            empty_token_secret("user-secret", "user3-ns"),
        ],
    )
}

/// Lists service accounts in exactly the order given.
pub struct ListedInOrder {
    accounts: Vec<ServiceAccount>,
    secrets: InMemoryResourceCache,
}

impl ListedInOrder {
    pub fn new(accounts: Vec<ServiceAccount>, secrets: impl IntoIterator<Item = Secret>) -> Self {
        Self {
            accounts,
            secrets: InMemoryResourceCache::from_resources(Vec::new(), secrets),
        }
    }
}

#[async_trait]
impl ResourceCache for ListedInOrder {
    async fn list_service_accounts(
        &self,
        namespace: &str,
    ) -> Result<Vec<ServiceAccount>, PluginError> {
        Ok(self
            .accounts
            .iter()
            .filter(|sa| sa.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, PluginError> {
        self.secrets.get_secret(namespace, name).await
    }
}

/// Understands `true`, `false` and `'<group>' in groups`.
pub struct GroupRuleEvaluator;

impl RuleEvaluator for GroupRuleEvaluator {
    fn eval_bool(&self, expression: &str, input: &serde_json::Value) -> Result<bool, PluginError> {
        match expression.trim() {
            "true" => return Ok(true),
            "false" => return Ok(false),
            _ => {}
        }
        let group = expression
            .strip_suffix(" in groups")
            .and_then(|g| g.strip_prefix('\''))
            .and_then(|g| g.strip_suffix('\''))
            .ok_or_else(|| PluginError::InvalidInput(expression.to_owned()))?;
        Ok(input["groups"]
            .as_array()
            .is_some_and(|groups| groups.iter().any(|g| g == group)))
    }
}

#[derive(Default)]
struct PolicyState {
    edges: HashMap<(String, String), usize>,
    adds: usize,
}

/// Allows `(subject-or-role, object, action)` triples registered with
/// [`RecordingPolicyEngine::allow`]; tracks edges with reference counts.
#[derive(Default)]
pub struct RecordingPolicyEngine {
    allowed: Mutex<HashSet<(String, String, String)>>,
    state: Mutex<PolicyState>,
    fail_add_after: Option<usize>,
    fail_remove: bool,
    fail_enforce: bool,
}

impl RecordingPolicyEngine {
    pub fn failing_add_after(n: usize) -> Self {
        Self {
            fail_add_after: Some(n),
            ..Self::default()
        }
    }

    pub fn failing_remove() -> Self {
        Self {
            fail_remove: true,
            ..Self::default()
        }
    }

    pub fn failing_enforce() -> Self {
        Self {
            fail_enforce: true,
            ..Self::default()
        }
    }

    pub fn allow(self, subject: &str, object: &str, action: &str) -> Self {
        self.allowed.lock().unwrap().insert((
            subject.to_owned(),
            object.to_owned(),
            action.to_owned(),
        ));
        self
    }

    pub fn edges_for(&self, subject: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut roles: Vec<String> = state
            .edges
            .keys()
            .filter(|(s, _)| s == subject)
            .map(|(_, r)| r.clone())
            .collect();
        roles.sort();
        roles
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().unwrap().edges.len()
    }
}

#[async_trait]
impl PolicyEngine for RecordingPolicyEngine {
    async fn enforce(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<bool, PluginError> {
        if self.fail_enforce {
            return Err(PluginError::Internal("enforce failed".to_owned()));
        }
        let allowed = self.allowed.lock().unwrap();
        let permits = |who: &str| {
            allowed.iter().any(|(s, o, a)| {
                s == who && (o == "*" || o == object) && (a == "*" || a == action)
            })
        };
        if permits(subject) {
            return Ok(true);
        }
        let roles = self.edges_for(subject);
        Ok(roles.iter().any(|r| permits(r)))
    }

    async fn add_grouping_policy(&self, subject: &str, role: &str) -> Result<bool, PluginError> {
        let mut state = self.state.lock().unwrap();
        if self.fail_add_after.is_some_and(|n| state.adds >= n) {
            return Err(PluginError::Internal("add failed".to_owned()));
        }
        state.adds += 1;
        let count = state
            .edges
            .entry((subject.to_owned(), role.to_owned()))
            .or_insert(0);
        *count += 1;
        Ok(*count == 1)
    }

    async fn remove_grouping_policy(&self, subject: &str, role: &str) -> Result<bool, PluginError> {
        if self.fail_remove {
            return Err(PluginError::Internal("remove failed".to_owned()));
        }
        let mut state = self.state.lock().unwrap();
        let key = (subject.to_owned(), role.to_owned());
        let Some(count) = state.edges.get(&key).copied() else {
            return Ok(false);
        };
        if count > 1 {
            state.edges.insert(key, count - 1);
            Ok(false)
        } else {
            state.edges.remove(&key);
            Ok(true)
        }
    }
}

/// SSO authorizer returning fixed claims.
pub struct StaticSso {
    pub claims: Option<Claims>,
    pub rbac: bool,
}

impl StaticSso {
    pub fn new(claims: Claims, rbac: bool) -> Self {
        Self {
            claims: Some(claims),
            rbac,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            claims: None,
            rbac: false,
        }
    }
}

#[async_trait]
impl SsoAuthorizer for StaticSso {
    async fn authorize(&self, _token: &str) -> Result<Claims, PluginError> {
        self.claims
            .clone()
            .ok_or_else(|| PluginError::Unauthorized("token rejected".to_owned()))
    }

    fn is_rbac_enabled(&self) -> bool {
        self.rbac
    }
}

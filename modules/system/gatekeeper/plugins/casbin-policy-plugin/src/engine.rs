//! casbin-backed [`PolicyEngine`].

use std::collections::HashMap;

use async_trait::async_trait;
use casbin::{CoreApi, DefaultModel, Enforcer, FileAdapter, MemoryAdapter, MgmtApi};
use gatekeeper_sdk::{PluginError, PolicyEngine};
use tokio::sync::RwLock;

use crate::config::{CasbinPolicyConfig, GroupingRule, PolicyRule};

/// Built-in model: subject/object/action with one role relation. Objects
/// match with `keyMatch`, actions match exactly or by `*`.
pub const MODEL_CONF: &str = include_str!("model.conf");

/// Reference count of one transiently granted edge.
#[derive(Debug, Clone, Copy)]
struct TransientEdge {
    holders: usize,
    /// False when the edge was already a static grouping rule.
    owned: bool,
}

struct State {
    enforcer: Enforcer,
    transient: HashMap<(String, String), TransientEdge>,
}

/// Policy engine over a casbin enforcer.
///
/// Grouping edges added through [`PolicyEngine::add_grouping_policy`] are
/// reference counted: overlapping decisions for the same subject and group
/// share one edge, which is removed when the last holder releases it. Static
/// grouping rules are never removed by a release.
pub struct CasbinPolicyEngine {
    state: RwLock<State>,
}

fn engine_error(e: casbin::Error) -> PluginError {
    PluginError::Internal(e.to_string())
}

impl CasbinPolicyEngine {
    /// Engine over an already configured enforcer.
    #[must_use]
    pub fn from_enforcer(enforcer: Enforcer) -> Self {
        Self {
            state: RwLock::new(State {
                enforcer,
                transient: HashMap::new(),
            }),
        }
    }

    /// Engine with the built-in model and the given static rules.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the model or a rule is rejected.
    pub async fn from_rules(
        rules: &[PolicyRule],
        groupings: &[GroupingRule],
    ) -> Result<Self, PluginError> {
        let model = DefaultModel::from_str(MODEL_CONF)
            .await
            .map_err(|e| PluginError::InvalidInput(e.to_string()))?;
        let mut enforcer = Enforcer::new(model, MemoryAdapter::default())
            .await
            .map_err(|e| PluginError::InvalidInput(e.to_string()))?;
        load_rules(&mut enforcer, rules, groupings).await?;
        Ok(Self::from_enforcer(enforcer))
    }

    /// Engine described by `cfg`: optional model and policy files, then
    /// inline rules.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a file or rule is rejected.
    pub async fn from_config(cfg: &CasbinPolicyConfig) -> Result<Self, PluginError> {
        let model = match &cfg.model_file {
            Some(path) => DefaultModel::from_file(path).await,
            None => DefaultModel::from_str(MODEL_CONF).await,
        }
        .map_err(|e| PluginError::InvalidInput(e.to_string()))?;

        let mut enforcer = match &cfg.policy_file {
            Some(path) => Enforcer::new(model, FileAdapter::new(path.clone())).await,
            None => Enforcer::new(model, MemoryAdapter::default()).await,
        }
        .map_err(|e| PluginError::InvalidInput(e.to_string()))?;
        enforcer.enable_auto_save(false);

        load_rules(&mut enforcer, &cfg.rules, &cfg.groupings).await?;
        tracing::info!(
            rules = cfg.rules.len(),
            groupings = cfg.groupings.len(),
            policy_file = ?cfg.policy_file,
            "casbin policy engine loaded"
        );
        Ok(Self::from_enforcer(enforcer))
    }

    /// Number of edges currently held by in-flight decisions.
    #[must_use]
    pub async fn transient_edges(&self) -> usize {
        self.state.read().await.transient.len()
    }
}

async fn load_rules(
    enforcer: &mut Enforcer,
    rules: &[PolicyRule],
    groupings: &[GroupingRule],
) -> Result<(), PluginError> {
    for rule in rules {
        enforcer
            .add_policy(vec![
                rule.subject.clone(),
                rule.object.clone(),
                rule.action.clone(),
            ])
            .await
            .map_err(|e| PluginError::InvalidInput(e.to_string()))?;
    }
    for grouping in groupings {
        enforcer
            .add_grouping_policy(vec![grouping.subject.clone(), grouping.role.clone()])
            .await
            .map_err(|e| PluginError::InvalidInput(e.to_string()))?;
    }
    enforcer
        .build_role_links()
        .map_err(|e| PluginError::InvalidInput(e.to_string()))
}

#[async_trait]
impl PolicyEngine for CasbinPolicyEngine {
    async fn enforce(
        &self,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<bool, PluginError> {
        let state = self.state.read().await;
        let allowed = state
            .enforcer
            .enforce((subject, object, action))
            .map_err(engine_error)?;
        tracing::trace!(sub = %subject, obj = %object, act = %action, allowed, "casbin enforce");
        Ok(allowed)
    }

    async fn add_grouping_policy(&self, subject: &str, role: &str) -> Result<bool, PluginError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let key = (subject.to_owned(), role.to_owned());
        if let Some(edge) = state.transient.get_mut(&key) {
            edge.holders += 1;
            return Ok(false);
        }
        let owned = state
            .enforcer
            .add_grouping_policy(vec![key.0.clone(), key.1.clone()])
            .await
            .map_err(engine_error)?;
        state.transient.insert(key, TransientEdge { holders: 1, owned });
        Ok(owned)
    }

    async fn remove_grouping_policy(
        &self,
        subject: &str,
        role: &str,
    ) -> Result<bool, PluginError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let key = (subject.to_owned(), role.to_owned());
        let Some(edge) = state.transient.get(&key).copied() else {
            return state
                .enforcer
                .remove_grouping_policy(vec![key.0, key.1])
                .await
                .map_err(engine_error);
        };
        if edge.holders > 1 {
            state.transient.insert(
                key,
                TransientEdge {
                    holders: edge.holders - 1,
                    ..edge
                },
            );
            return Ok(false);
        }
        state.transient.remove(&key);
        if !edge.owned {
            return Ok(false);
        }
        state
            .enforcer
            .remove_grouping_policy(vec![key.0, key.1])
            .await
            .map_err(engine_error)
    }
}

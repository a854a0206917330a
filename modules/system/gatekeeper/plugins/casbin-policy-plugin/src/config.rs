//! Configuration for the casbin policy engine.

use std::path::PathBuf;

use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CasbinPolicyConfig {
    /// casbin model file. The built-in model is used when absent.
    pub model_file: Option<PathBuf>,

    /// casbin CSV policy file, loaded before `rules` and `groupings`.
    pub policy_file: Option<PathBuf>,

    pub rules: Vec<PolicyRule>,

    pub groupings: Vec<GroupingRule>,
}

/// `p, subject, object, action`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    pub subject: String,
    pub object: String,
    pub action: String,
}

/// `g, subject, role`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupingRule {
    pub subject: String,
    pub role: String,
}

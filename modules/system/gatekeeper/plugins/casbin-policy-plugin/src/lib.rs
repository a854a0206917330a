#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Casbin Policy Engine Plugin
//!
//! Implements `gatekeeper_sdk::PolicyEngine` with a casbin enforcer. Static
//! rules come from configuration or from casbin model/policy files; the
//! gatekeeper adds and removes group edges per decision.

pub mod config;
pub mod engine;

pub use config::{CasbinPolicyConfig, GroupingRule, PolicyRule};
pub use engine::{CasbinPolicyEngine, MODEL_CONF};

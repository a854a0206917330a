#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! CEL Rule Evaluator Plugin
//!
//! Evaluates the boolean predicates attached to service accounts through the
//! `workflows.argoproj.io/rbac-rule` annotation.

mod evaluator;

pub use evaluator::CelRuleEvaluator;

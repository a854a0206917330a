use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use cel_interpreter::{Context, Program, Value};
use dashmap::DashMap;
use gatekeeper_sdk::{PluginError, RuleEvaluator};

/// [`RuleEvaluator`] backed by `cel-interpreter`.
///
/// Programs are compiled once per distinct expression and reused.
#[derive(Default)]
pub struct CelRuleEvaluator {
    programs: DashMap<String, Arc<Program>>,
}

impl CelRuleEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn program(&self, expression: &str) -> Result<Arc<Program>, PluginError> {
        if let Some(program) = self.programs.get(expression) {
            return Ok(Arc::clone(program.value()));
        }
        // The parser can panic on some malformed input instead of erroring.
        let program = panic::catch_unwind(AssertUnwindSafe(|| Program::compile(expression)))
            .map_err(|_| {
                tracing::warn!(rule = %expression, "rule parser panicked");
                PluginError::InvalidInput(format!("failed to compile rule {expression:?}"))
            })?
            .map_err(|e| {
                PluginError::InvalidInput(format!("failed to compile rule {expression:?}: {e}"))
            })?;
        let program = Arc::new(program);
        self.programs
            .insert(expression.to_owned(), Arc::clone(&program));
        Ok(program)
    }
}

impl RuleEvaluator for CelRuleEvaluator {
    fn eval_bool(&self, expression: &str, input: &serde_json::Value) -> Result<bool, PluginError> {
        let program = self.program(expression)?;

        let mut context = Context::default();
        if let Some(fields) = input.as_object() {
            for (name, value) in fields {
                context
                    .add_variable(name.as_str(), value.clone())
                    .map_err(|e| PluginError::Internal(format!("failed to bind {name}: {e}")))?;
            }
        }

        match program.execute(&context) {
            Ok(Value::Bool(result)) => Ok(result),
            Ok(other) => Err(PluginError::InvalidInput(format!(
                "rule {expression:?} did not evaluate to a boolean: {other:?}"
            ))),
            Err(e) => {
                tracing::debug!(rule = %expression, error = %e, "rule evaluation failed");
                Err(PluginError::Internal(format!(
                    "failed to evaluate rule {expression:?}: {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use kubegate_security::Claims;

    fn claims_json(groups: &[&str]) -> serde_json::Value {
        Claims::builder()
            .subject("my-sub")
            .email("me@example.com")
            .groups(groups.iter().map(|g| (*g).to_owned()).collect())
            .build()
            .to_json()
            .unwrap()
    }

    #[test]
    fn constant_rules() {
        let evaluator = CelRuleEvaluator::new();
        let input = claims_json(&[]);

        assert!(evaluator.eval_bool("true", &input).unwrap());
        assert!(!evaluator.eval_bool("false", &input).unwrap());
    }

    #[test]
    fn group_membership_rule() {
        let evaluator = CelRuleEvaluator::new();
        let rule = "'my-group' in groups";

        assert!(evaluator.eval_bool(rule, &claims_json(&["my-group"])).unwrap());
        assert!(!evaluator.eval_bool(rule, &claims_json(&["other-group"])).unwrap());
        assert!(!evaluator.eval_bool(rule, &claims_json(&[])).unwrap());
    }

    #[test]
    fn string_claim_rule() {
        let evaluator = CelRuleEvaluator::new();

        assert!(
            evaluator
                .eval_bool("sub == 'my-sub' && email.endsWith('@example.com')", &claims_json(&[]))
                .unwrap()
        );
    }

    #[test]
    fn syntax_error_is_invalid_input() {
        let err = CelRuleEvaluator::new()
            .eval_bool("'my-group' in", &claims_json(&[]))
            .unwrap_err();

        assert!(matches!(err, PluginError::InvalidInput(_)));
    }

    #[test]
    fn dangling_operator_is_invalid_input() {
        let evaluator = CelRuleEvaluator::new();
        let input = claims_json(&["admins"]);

        let err = evaluator
            .eval_bool("'admins' in groups &&", &input)
            .unwrap_err();

        assert!(matches!(err, PluginError::InvalidInput(_)));
        assert!(evaluator.eval_bool("'admins' in groups", &input).unwrap());
    }

    #[test]
    fn absent_email_compares_false() {
        let input = Claims::builder()
            .subject("bob")
            .groups(vec!["viewers".to_owned()])
            .build()
            .to_json()
            .unwrap();
        let evaluator = CelRuleEvaluator::new();

        assert!(!evaluator.eval_bool("email == 'root@example.com'", &input).unwrap());
        assert!(!evaluator.eval_bool("name == 'root'", &input).unwrap());
        assert!(evaluator.eval_bool("'viewers' in groups", &input).unwrap());
    }

    #[test]
    fn non_boolean_result_is_invalid_input() {
        let err = CelRuleEvaluator::new()
            .eval_bool("sub", &claims_json(&[]))
            .unwrap_err();

        assert!(matches!(err, PluginError::InvalidInput(_)));
    }

    #[test]
    fn unknown_variable_is_internal() {
        let err = CelRuleEvaluator::new()
            .eval_bool("'admins' in roles", &claims_json(&[]))
            .unwrap_err();

        assert!(matches!(err, PluginError::Internal(_)));
    }

    #[test]
    fn programs_are_cached() {
        let evaluator = CelRuleEvaluator::new();
        let input = claims_json(&["a"]);

        evaluator.eval_bool("'a' in groups", &input).unwrap();
        evaluator.eval_bool("'a' in groups", &input).unwrap();

        assert_eq!(evaluator.programs.len(), 1);
    }
}

//! Translation rules and the sequential rule loop shared by both profile
//! directions.

use crate::action::{ActionDescriptor, ExecutionFlow, InvocationContext};
use crate::context::TranslationContext;
use crate::error::{ActionError, EvaluationError, TranslationError};
use crate::expression::ExpressionEvaluator;
use crate::profile::ProfileResolver;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Boolean expression gating a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationCondition {
    #[serde(rename = "conditionValue")]
    expression: String,
}

impl TranslationCondition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    /// Condition that always passes.
    pub fn always() -> Self {
        Self::new("true")
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn evaluate(
        &self,
        evaluator: &dyn ExpressionEvaluator,
        context: &TranslationContext,
    ) -> Result<bool, EvaluationError> {
        evaluator.evaluate_condition(&self.expression, context)
    }
}

impl Default for TranslationCondition {
    fn default() -> Self {
        Self::always()
    }
}

/// A condition paired with the action it gates.
pub struct TranslationRule<A: ?Sized> {
    condition: TranslationCondition,
    action: Arc<A>,
}

impl<A: ?Sized> TranslationRule<A> {
    pub fn new(condition: TranslationCondition, action: Arc<A>) -> Self {
        Self { condition, action }
    }

    pub fn condition(&self) -> &TranslationCondition {
        &self.condition
    }

    pub fn action(&self) -> &Arc<A> {
        &self.action
    }
}

impl<A: ?Sized> Clone for TranslationRule<A> {
    fn clone(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

impl<A: ActionDescriptor + ?Sized> fmt::Debug for TranslationRule<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationRule")
            .field("condition", &self.condition.expression)
            .field("action", self.action.definition())
            .finish()
    }
}

/// Per-call state shared by every rule of one profile run.
pub(crate) struct RuleScope<'a> {
    pub profile: &'a str,
    pub translation_id: Uuid,
    pub variables: &'a TranslationContext,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub resolver: &'a dyn ProfileResolver,
    pub include_chain: &'a [String],
}

/// Run `rules` in declaration order.
///
/// A false condition skips the rule. A failing condition or action aborts
/// the loop with an error naming the profile and the 1-based rule index. An
/// action reporting [`ExecutionFlow::Break`] ends the loop normally.
pub(crate) fn run_rules<A, F>(
    rules: &[TranslationRule<A>],
    scope: &RuleScope<'_>,
    mut invoke: F,
) -> Result<ExecutionFlow, TranslationError>
where
    A: ActionDescriptor + ?Sized,
    F: FnMut(&A, &InvocationContext<'_>) -> Result<ExecutionFlow, ActionError>,
{
    for (position, rule) in rules.iter().enumerate() {
        let rule_index = position + 1;
        let matched = rule
            .condition
            .evaluate(scope.evaluator, scope.variables)
            .map_err(|source| TranslationError::ConditionEvaluation {
                profile: scope.profile.to_string(),
                rule_index,
                source,
            })?;
        if !matched {
            debug!(
                "Translation {} profile '{}' rule {}: condition not met, skipping",
                scope.translation_id, scope.profile, rule_index
            );
            continue;
        }

        debug!(
            "Translation {} profile '{}' rule {}: condition met, invoking {}",
            scope.translation_id,
            scope.profile,
            rule_index,
            rule.action.definition()
        );
        let invocation = InvocationContext {
            profile: scope.profile,
            rule_index,
            translation_id: scope.translation_id,
            variables: scope.variables,
            evaluator: scope.evaluator,
            resolver: scope.resolver,
            include_chain: scope.include_chain,
        };
        let flow = invoke(rule.action.as_ref(), &invocation).map_err(|source| {
            TranslationError::ActionInvocation {
                profile: scope.profile.to_string(),
                rule_index,
                action: rule.action.name().to_string(),
                source,
            }
        })?;
        if flow == ExecutionFlow::Break {
            debug!(
                "Translation {} profile '{}' rule {}: execution break, remaining rules skipped",
                scope.translation_id, scope.profile, rule_index
            );
            return Ok(ExecutionFlow::Break);
        }
    }
    Ok(ExecutionFlow::Continue)
}

//! Expression evaluation for rule conditions and action parameters.
//!
//! The engine only depends on the [`ExpressionEvaluator`] contract: evaluate
//! a string against a [`TranslationContext`] without side effects, failing
//! with an [`EvaluationError`] on syntax or type problems. [`StandardEvaluator`]
//! is the built-in implementation; any sandboxed language can be plugged in
//! instead.
//!
//! # Examples
//!
//! ```rust
//! use identity_translation::context::TranslationContext;
//! use identity_translation::expression::{ExpressionEvaluator, StandardEvaluator};
//! use serde_json::json;
//!
//! let context = TranslationContext::from_value(json!({
//!     "attr": {"email": "a@b.org"}
//! }));
//! let evaluator = StandardEvaluator::new();
//! assert!(evaluator.evaluate_condition("attr['email'] != null", &context).unwrap());
//! assert_eq!(
//!     evaluator.evaluate("attr['email'].toUpperCase()", &context).unwrap(),
//!     json!("A@B.ORG")
//! );
//! ```

mod evaluator;
mod parser;


pub use evaluator::{StandardEvaluator, display_value, type_name};

use crate::context::TranslationContext;
use crate::error::EvaluationError;
use serde_json::Value;

/// Evaluates expressions against a translation context.
///
/// Implementations must be pure and deterministic for a given context, and
/// safe to share between threads.
pub trait ExpressionEvaluator: Send + Sync + std::fmt::Debug {
    /// Evaluate an expression to a value.
    fn evaluate(&self, expression: &str, context: &TranslationContext)
    -> Result<Value, EvaluationError>;

    /// Evaluate an expression that must produce a boolean.
    ///
    /// Any non-boolean result, `null` included, is an error rather than
    /// `false`.
    fn evaluate_condition(
        &self,
        expression: &str,
        context: &TranslationContext,
    ) -> Result<bool, EvaluationError> {
        match self.evaluate(expression, context)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvaluationError::NotBoolean {
                expression: expression.to_string(),
                actual: type_name(&other).to_string(),
            }),
        }
    }
}

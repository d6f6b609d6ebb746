//! Translation action abstraction.
//!
//! An action is identified by a name and an ordered list of string
//! parameters ([`ActionDefinition`]). Concrete actions are created by an
//! [`ActionFactory`] looked up by name in the [`ActionRegistry`]; nothing in
//! the rule loop knows about individual action types.
//!
//! Input actions return a fresh [`MappingResult`] that the profile merges.
//! Output actions mutate the shared [`TranslationResult`]. Both report an
//! [`ExecutionFlow`] so an action can stop the remaining rules of the
//! profile without failing it.

mod registry;

pub use registry::ActionRegistry;

use crate::context::TranslationContext;
use crate::error::{ActionError, RegistryError};
use crate::expression::ExpressionEvaluator;
use crate::model::{RemotelyAuthenticatedInput, TranslationInput};
use crate::profile::{ProfileDirection, ProfileResolver};
use crate::result::{MappingResult, TranslationResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Name and parameters of an action, as stored in profile JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, parameters: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    /// Parameter at `index`, if given and not empty.
    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.parameters
            .get(index)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

impl fmt::Display for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(", "))
    }
}

/// Whether rule processing goes on after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionFlow {
    #[default]
    Continue,
    /// Skip the remaining rules; the result gathered so far is kept
    Break,
}

/// What an input action hands back to the profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingOutcome {
    pub result: MappingResult,
    pub flow: ExecutionFlow,
}

impl MappingOutcome {
    pub fn proceed(result: MappingResult) -> Self {
        Self {
            result,
            flow: ExecutionFlow::Continue,
        }
    }

    pub fn halt(result: MappingResult) -> Self {
        Self {
            result,
            flow: ExecutionFlow::Break,
        }
    }
}

/// Everything an action may use besides the translation input.
///
/// Carries the rule-scoped logging fields explicitly so actions can render
/// them into their log lines.
#[derive(Clone, Copy)]
pub struct InvocationContext<'a> {
    pub profile: &'a str,
    /// 1-based index of the rule being executed
    pub rule_index: usize,
    /// Correlates log lines of one `translate()` call
    pub translation_id: Uuid,
    pub variables: &'a TranslationContext,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub resolver: &'a dyn ProfileResolver,
    /// Names of the profiles currently executing, outermost first
    pub include_chain: &'a [String],
}

impl InvocationContext<'_> {
    /// Evaluate an action parameter expression against the rule context.
    pub fn evaluate(&self, expression: &str) -> Result<Value, ActionError> {
        self.evaluator
            .evaluate(expression, self.variables)
            .map_err(|e| ActionError::evaluation(expression, e))
    }
}

impl fmt::Debug for InvocationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("profile", &self.profile)
            .field("rule_index", &self.rule_index)
            .field("translation_id", &self.translation_id)
            .field("include_chain", &self.include_chain)
            .finish_non_exhaustive()
    }
}

/// Common surface of all actions.
pub trait ActionDescriptor: Send + Sync + fmt::Debug {
    /// The definition the action was created from.
    fn definition(&self) -> &ActionDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }
}

/// Action of an input profile.
pub trait InputTranslationAction: ActionDescriptor {
    fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError>;
}

/// Action of an output profile.
pub trait OutputTranslationAction: ActionDescriptor {
    fn invoke(
        &self,
        input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError>;
}

/// An instantiated action of either direction.
#[derive(Debug, Clone)]
pub enum TranslationAction {
    Input(Arc<dyn InputTranslationAction>),
    Output(Arc<dyn OutputTranslationAction>),
}

impl TranslationAction {
    pub fn direction(&self) -> ProfileDirection {
        match self {
            Self::Input(_) => ProfileDirection::Input,
            Self::Output(_) => ProfileDirection::Output,
        }
    }

    pub fn definition(&self) -> &ActionDefinition {
        match self {
            Self::Input(action) => action.definition(),
            Self::Output(action) => action.definition(),
        }
    }
}

/// Shape of a single action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Evaluated against the context at invocation time
    Expression,
    /// Used verbatim
    Text,
    /// Regular expression, compiled when the action is created
    Regex,
    /// One of a fixed set of constants
    Enum(&'static [&'static str]),
    Boolean,
    Integer,
}

/// Declared signature entry of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionParameter {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub required: bool,
}

impl ActionParameter {
    pub const fn required(name: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    fn check(&self, action: &str, value: &str) -> Result<(), RegistryError> {
        if value.is_empty() {
            return if self.required {
                Err(RegistryError::invalid_parameters(
                    action,
                    format!("parameter '{}' must not be empty", self.name),
                ))
            } else {
                Ok(())
            };
        }
        let problem = match self.kind {
            ParameterKind::Expression | ParameterKind::Text => None,
            ParameterKind::Regex => Regex::new(value)
                .err()
                .map(|e| format!("parameter '{}' is not a valid regular expression: {}", self.name, e)),
            ParameterKind::Enum(allowed) => (!allowed.contains(&value)).then(|| {
                format!(
                    "parameter '{}' must be one of {}, got '{}'",
                    self.name,
                    allowed.join(", "),
                    value
                )
            }),
            ParameterKind::Boolean => value
                .parse::<bool>()
                .err()
                .map(|_| format!("parameter '{}' must be true or false, got '{}'", self.name, value)),
            ParameterKind::Integer => value
                .parse::<i64>()
                .err()
                .map(|_| format!("parameter '{}' must be an integer, got '{}'", self.name, value)),
        };
        match problem {
            Some(message) => Err(RegistryError::invalid_parameters(action, message)),
            None => Ok(()),
        }
    }
}

/// Check a parameter list against a signature: count first, then each value.
pub fn validate_parameters(
    action: &str,
    signature: &[ActionParameter],
    parameters: &[String],
) -> Result<(), RegistryError> {
    let required = signature.iter().filter(|p| p.required).count();
    if parameters.len() < required || parameters.len() > signature.len() {
        let expected = if required == signature.len() {
            required.to_string()
        } else {
            format!("{}..{}", required, signature.len())
        };
        return Err(RegistryError::invalid_parameters(
            action,
            format!("expected {} parameters, got {}", expected, parameters.len()),
        ));
    }
    signature
        .iter()
        .zip(parameters)
        .try_for_each(|(param, value)| param.check(action, value))
}

/// Creates actions of one type from their definitions.
pub trait ActionFactory: Send + Sync + fmt::Debug {
    /// Direction of the actions this factory creates.
    fn direction(&self) -> ProfileDirection;

    /// Declared parameter signature.
    fn parameters(&self) -> &[ActionParameter];

    /// Instantiate an action. Implementations may assume the definition
    /// passed [`validate`](Self::validate).
    fn create(&self, definition: ActionDefinition) -> Result<TranslationAction, RegistryError>;

    fn validate(&self, definition: &ActionDefinition) -> Result<(), RegistryError> {
        validate_parameters(&definition.name, self.parameters(), &definition.parameters)
    }
}

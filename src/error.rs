//! Error types for the translation engine.
//!
//! Errors are split by the phase they belong to: expression evaluation,
//! action invocation, profile loading, translation, and applying results to
//! an external store. Load-time problems (unknown actions, bad parameters)
//! never surface from `translate()`, and translation problems never surface
//! from the loaders.

use crate::profile::ProfileDirection;

/// Errors raised by an [`ExpressionEvaluator`](crate::expression::ExpressionEvaluator).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    /// The expression text could not be parsed
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A variable is not present in the context
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    /// An operator or method got operands of the wrong type
    #[error("Type error: {message}")]
    Type { message: String },

    /// A method call, field access or index on a null value
    #[error("Null reference: {message}")]
    NullReference { message: String },

    /// Method is not defined for the receiver type
    #[error("Unknown method '{method}' for {receiver}")]
    UnknownMethod { method: String, receiver: String },

    /// List index outside of the list bounds
    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// A regular expression used by the expression failed to compile
    #[error("Invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A condition evaluated to something other than a boolean
    #[error("Condition '{expression}' evaluated to {actual}, expected a boolean")]
    NotBoolean { expression: String, actual: String },
}

/// Errors raised while an action is being invoked.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// An expression parameter failed to evaluate
    #[error("Expression '{expression}' failed: {source}")]
    Evaluation {
        expression: String,
        #[source]
        source: EvaluationError,
    },

    /// The evaluated value can not be used by the action
    #[error("Invalid value for {target}: {message}")]
    InvalidValue { target: String, message: String },

    /// An included profile is not known to the resolver
    #[error("Included {direction} profile '{profile}' does not exist")]
    IncludedProfileMissing {
        profile: String,
        direction: ProfileDirection,
    },

    /// A profile includes itself, directly or transitively
    #[error("Profile inclusion cycle: {}", chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },

    /// An included profile failed
    #[error("Included profile failed: {0}")]
    Nested(#[source] Box<TranslationError>),
}

impl ActionError {
    /// Wrap an evaluation failure with the expression that produced it.
    pub fn evaluation(expression: &str, source: EvaluationError) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            source,
        }
    }
}

/// Errors raised by the [`ActionRegistry`](crate::action::ActionRegistry) and
/// action factories.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// No factory is registered under the name
    #[error("Translation action '{0}' is not registered")]
    ActionNotFound(String),

    /// Parameters do not fit the action signature
    #[error("Invalid parameters for action '{action}': {message}")]
    InvalidParameters { action: String, message: String },

    /// A factory with the same name is already registered
    #[error("Translation action '{0}' is already registered")]
    DuplicateAction(String),
}

impl RegistryError {
    pub fn invalid_parameters(action: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            action: action.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised while loading a profile from its JSON form.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The document is not valid JSON or does not have the profile shape
    #[error("Invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The `ver` field names a format this crate does not read
    #[error("Unsupported profile format version '{0}'")]
    UnsupportedVersion(String),

    /// A field required by the format is missing
    #[error("Profile is missing required field '{0}'")]
    MissingField(String),

    /// A rule's action could not be resolved or instantiated
    #[error("Rule {rule_index} of profile '{profile}': {source}")]
    Action {
        profile: String,
        rule_index: usize,
        #[source]
        source: RegistryError,
    },

    /// A rule's action belongs to the other translation direction
    #[error(
        "Rule {rule_index} of profile '{profile}': action '{action}' is an {actual} action, expected {expected}"
    )]
    ActionDirectionMismatch {
        profile: String,
        rule_index: usize,
        action: String,
        expected: ProfileDirection,
        actual: ProfileDirection,
    },

    /// The document declares a different direction than the one requested
    #[error("Profile '{profile}' is an {actual} profile, expected {expected}")]
    DirectionMismatch {
        profile: String,
        expected: ProfileDirection,
        actual: ProfileDirection,
    },

    /// Two profiles of one direction share a name
    #[error("Duplicate {direction} profile '{profile}'")]
    DuplicateProfile {
        profile: String,
        direction: ProfileDirection,
    },

    /// Reading a profile file failed
    #[error("Can not read profile file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a `translate()` call.
///
/// Both variants carry the profile name and the 1-based rule index so an
/// operator can find the offending rule.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    /// The rule's condition could not be evaluated
    #[error("Condition of rule {rule_index} in profile '{profile}' failed: {source}")]
    ConditionEvaluation {
        profile: String,
        rule_index: usize,
        #[source]
        source: EvaluationError,
    },

    /// The rule's action failed
    #[error("Action '{action}' of rule {rule_index} in profile '{profile}' failed: {source}")]
    ActionInvocation {
        profile: String,
        rule_index: usize,
        action: String,
        #[source]
        source: ActionError,
    },
}

impl TranslationError {
    /// Name of the profile whose rule failed.
    pub fn profile(&self) -> &str {
        match self {
            Self::ConditionEvaluation { profile, .. } | Self::ActionInvocation { profile, .. } => {
                profile
            }
        }
    }

    /// 1-based index of the failing rule.
    pub fn rule_index(&self) -> usize {
        match self {
            Self::ConditionEvaluation { rule_index, .. }
            | Self::ActionInvocation { rule_index, .. } => *rule_index,
        }
    }
}

/// Errors raised while applying a [`TranslationResult`](crate::result::TranslationResult)
/// to the identity and attribute stores.
///
/// Items applied before the failure stay applied.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Persisting an identity failed
    #[error("Can not persist identity {identity}: {source}")]
    Identity {
        identity: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Persisting an attribute failed
    #[error("Can not persist attribute {attribute}: {source}")]
    Attribute {
        attribute: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors returned by the [`TranslationEngine`](crate::engine::TranslationEngine) facade.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No profile with the name and direction is configured
    #[error("No {direction} translation profile named '{profile}'")]
    ProfileNotFound {
        profile: String,
        direction: ProfileDirection,
    },

    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Profile configuration error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// The reconciliation collaborator rejected the mapping
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

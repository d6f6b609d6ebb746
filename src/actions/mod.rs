//! Built-in translation actions.
//!
//! Every built-in is exposed through a [`BuiltinActionFactory`] and
//! registered by [`ActionRegistry::with_builtin_actions`](crate::action::ActionRegistry::with_builtin_actions).
//! Custom actions plug in the same way through
//! [`ActionRegistry::register_factory`](crate::action::ActionRegistry::register_factory).

mod input;
mod output;


#[cfg(test)]
pub(crate) use input::create_break_input;

use crate::action::{
    ActionDefinition, ActionFactory, ActionParameter, InvocationContext, TranslationAction,
};
use crate::error::{ActionError, RegistryError};
use crate::expression::display_value;
use crate::profile::ProfileDirection;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Constructor of a concrete action from a validated definition.
pub type CreateActionFn = fn(ActionDefinition) -> Result<TranslationAction, RegistryError>;

/// Factory backed by a static signature and a constructor function.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinActionFactory {
    direction: ProfileDirection,
    parameters: &'static [ActionParameter],
    create: CreateActionFn,
}

impl BuiltinActionFactory {
    pub const fn new(
        direction: ProfileDirection,
        parameters: &'static [ActionParameter],
        create: CreateActionFn,
    ) -> Self {
        Self {
            direction,
            parameters,
            create,
        }
    }
}

impl ActionFactory for BuiltinActionFactory {
    fn direction(&self) -> ProfileDirection {
        self.direction
    }

    fn parameters(&self) -> &[ActionParameter] {
        self.parameters
    }

    fn create(&self, definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
        self.validate(&definition)?;
        (self.create)(definition)
    }
}

/// All built-in factories with the names they register under.
pub(crate) fn builtin_factories() -> Vec<(&'static str, Arc<dyn ActionFactory>)> {
    const IN: ProfileDirection = ProfileDirection::Input;
    const OUT: ProfileDirection = ProfileDirection::Output;
    let table: [(&'static str, BuiltinActionFactory); 18] = [
        (
            "mapIdentity",
            BuiltinActionFactory::new(IN, &input::MAP_IDENTITY, input::create_map_identity),
        ),
        (
            "mapAttribute",
            BuiltinActionFactory::new(IN, &input::MAP_ATTRIBUTE, input::create_map_attribute),
        ),
        (
            "mapGroup",
            BuiltinActionFactory::new(IN, &input::MAP_GROUP, input::create_map_group),
        ),
        (
            "multiMapAttribute",
            BuiltinActionFactory::new(
                IN,
                &input::MULTI_MAP_ATTRIBUTE,
                input::create_multi_map_attribute,
            ),
        ),
        (
            "entityChange",
            BuiltinActionFactory::new(IN, &input::ENTITY_CHANGE, input::create_entity_change),
        ),
        (
            "removeStaleData",
            BuiltinActionFactory::new(IN, &[], input::create_remove_stale_data),
        ),
        (
            "includeInputProfile",
            BuiltinActionFactory::new(IN, &INCLUDE_PROFILE, input::create_include_input),
        ),
        (
            "breakInputRules",
            BuiltinActionFactory::new(IN, &[], input::create_break_input),
        ),
        (
            "createAttribute",
            BuiltinActionFactory::new(
                OUT,
                &output::CREATE_ATTRIBUTE,
                output::create_create_attribute,
            ),
        ),
        (
            "createPersistentAttribute",
            BuiltinActionFactory::new(
                OUT,
                &output::CREATE_PERSISTENT_ATTRIBUTE,
                output::create_create_persistent_attribute,
            ),
        ),
        (
            "createIdentity",
            BuiltinActionFactory::new(
                OUT,
                &output::CREATE_IDENTITY,
                output::create_create_identity,
            ),
        ),
        (
            "createPersistentIdentity",
            BuiltinActionFactory::new(
                OUT,
                &output::CREATE_IDENTITY,
                output::create_create_persistent_identity,
            ),
        ),
        (
            "filterAttribute",
            BuiltinActionFactory::new(
                OUT,
                &output::FILTER_ATTRIBUTE,
                output::create_filter_attribute,
            ),
        ),
        (
            "removeAttribute",
            BuiltinActionFactory::new(
                OUT,
                &output::REMOVE_ATTRIBUTE,
                output::create_remove_attribute,
            ),
        ),
        (
            "filterIdentity",
            BuiltinActionFactory::new(
                OUT,
                &output::FILTER_IDENTITY,
                output::create_filter_identity,
            ),
        ),
        (
            "redirect",
            BuiltinActionFactory::new(OUT, &output::REDIRECT, output::create_redirect),
        ),
        (
            "includeOutputProfile",
            BuiltinActionFactory::new(OUT, &INCLUDE_PROFILE, output::create_include_output),
        ),
        (
            "breakOutputRules",
            BuiltinActionFactory::new(OUT, &[], output::create_break_output),
        ),
    ];
    table
        .into_iter()
        .map(|(name, factory)| (name, Arc::new(factory) as Arc<dyn ActionFactory>))
        .collect()
}

static INCLUDE_PROFILE: [ActionParameter; 1] = [ActionParameter::required(
    "profileName",
    crate::action::ParameterKind::Text,
)];

/// Parameter that passed signature validation as required.
fn required_param(definition: &ActionDefinition, index: usize) -> Result<String, RegistryError> {
    definition
        .parameter(index)
        .map(str::to_string)
        .ok_or_else(|| {
            RegistryError::invalid_parameters(
                &definition.name,
                format!("missing parameter {}", index + 1),
            )
        })
}

fn optional_param(definition: &ActionDefinition, index: usize) -> Option<String> {
    definition.parameter(index).map(str::to_string)
}

/// Parse an optional constant parameter, falling back to `default`.
fn parse_param<T>(definition: &ActionDefinition, index: usize, default: T) -> Result<T, RegistryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match definition.parameter(index) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| RegistryError::invalid_parameters(&definition.name, e.to_string())),
        None => Ok(default),
    }
}

/// Compile a regex parameter so that it must match the whole text.
fn whole_match_regex(definition: &ActionDefinition, pattern: &str) -> Result<Regex, RegistryError> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| RegistryError::invalid_parameters(&definition.name, e.to_string()))
}

/// Fail when `profile` is already running further up the include chain.
fn check_include_cycle(invocation: &InvocationContext<'_>, profile: &str) -> Result<(), ActionError> {
    if invocation.include_chain.iter().any(|p| p == profile) {
        let mut chain = invocation.include_chain.to_vec();
        chain.push(profile.to_string());
        return Err(ActionError::IncludeCycle { chain });
    }
    Ok(())
}

/// Strings carried by an expression value: lists element-wise (nulls
/// skipped), scalars as their display form, nothing for `null`.
pub(crate) fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(display_value)
            .collect(),
        other => vec![display_value(other)],
    }
}

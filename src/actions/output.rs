//! Actions of output profiles.

use super::{check_include_cycle, optional_param, parse_param, required_param, value_strings, whole_match_regex};
use crate::action::{
    ActionDefinition, ActionDescriptor, ActionParameter, ExecutionFlow, InvocationContext,
    OutputTranslationAction, ParameterKind, TranslationAction,
};
use crate::error::{ActionError, RegistryError};
use crate::expression::display_value;
use crate::model::{Attribute, IdentityParam, ROOT_GROUP, TranslationInput};
use crate::profile::ProfileDirection;
use crate::result::{DynamicAttribute, ResultScope, TranslationResult};
use log::debug;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

pub(super) static CREATE_ATTRIBUTE: [ActionParameter; 5] = [
    ActionParameter::required("attributeName", ParameterKind::Text),
    ActionParameter::required("expression", ParameterKind::Expression),
    ActionParameter::optional("mandatory", ParameterKind::Boolean),
    ActionParameter::optional("displayName", ParameterKind::Text),
    ActionParameter::optional("description", ParameterKind::Text),
];

pub(super) static CREATE_PERSISTENT_ATTRIBUTE: [ActionParameter; 3] = [
    ActionParameter::required("attributeName", ParameterKind::Text),
    ActionParameter::required("expression", ParameterKind::Expression),
    ActionParameter::optional("group", ParameterKind::Text),
];

pub(super) static CREATE_IDENTITY: [ActionParameter; 2] = [
    ActionParameter::required("identityType", ParameterKind::Text),
    ActionParameter::required("expression", ParameterKind::Expression),
];

pub(super) static FILTER_ATTRIBUTE: [ActionParameter; 1] =
    [ActionParameter::required("attributeRegex", ParameterKind::Regex)];

pub(super) static REMOVE_ATTRIBUTE: [ActionParameter; 1] =
    [ActionParameter::required("attributeName", ParameterKind::Text)];

pub(super) static FILTER_IDENTITY: [ActionParameter; 2] = [
    ActionParameter::optional("identityType", ParameterKind::Text),
    ActionParameter::optional("valueRegex", ParameterKind::Regex),
];

pub(super) static REDIRECT: [ActionParameter; 1] =
    [ActionParameter::required("urlExpression", ParameterKind::Expression)];

fn output_action(action: impl OutputTranslationAction + 'static) -> TranslationAction {
    TranslationAction::Output(Arc::new(action))
}

fn log_removed(invocation: &InvocationContext<'_>, what: &str, removed: &[String]) {
    if !removed.is_empty() {
        debug!(
            "Translation {} profile '{}' rule {}: removed {} {}",
            invocation.translation_id,
            invocation.profile,
            invocation.rule_index,
            what,
            removed.join(", ")
        );
    }
}

/// Evaluate an expression to attribute values; `None` when it yields null.
fn evaluate_values(
    invocation: &InvocationContext<'_>,
    expression: &str,
) -> Result<Option<Vec<String>>, ActionError> {
    let value = invocation.evaluate(expression)?;
    if value.is_null() {
        debug!(
            "Translation {} profile '{}' rule {}: expression '{}' evaluated to null, nothing created",
            invocation.translation_id, invocation.profile, invocation.rule_index, expression
        );
        return Ok(None);
    }
    Ok(Some(value_strings(&value)))
}

/// Exposes a new attribute computed from an expression. An exposed attribute
/// of the same name is replaced.
#[derive(Debug)]
pub struct CreateAttributeAction {
    definition: ActionDefinition,
    attribute_name: String,
    expression: String,
    mandatory: bool,
    display_name: Option<String>,
    description: Option<String>,
}

pub(super) fn create_create_attribute(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(output_action(CreateAttributeAction {
        attribute_name: required_param(&definition, 0)?,
        expression: required_param(&definition, 1)?,
        mandatory: parse_param(&definition, 2, false)?,
        display_name: optional_param(&definition, 3),
        description: optional_param(&definition, 4),
        definition,
    }))
}

impl ActionDescriptor for CreateAttributeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for CreateAttributeAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        let Some(values) = evaluate_values(invocation, &self.expression)? else {
            return Ok(ExecutionFlow::Continue);
        };
        result.remove_attributes_by_name(ResultScope::Exposed, &self.attribute_name);
        let attribute = Attribute::new(&self.attribute_name, ROOT_GROUP, values)
            .with_origin(None, Some(invocation.profile));
        debug!(
            "Translation {} profile '{}' rule {}: created attribute {}",
            invocation.translation_id, invocation.profile, invocation.rule_index, attribute
        );
        result.add_attribute(DynamicAttribute {
            attribute,
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            mandatory: self.mandatory,
        });
        Ok(ExecutionFlow::Continue)
    }
}

/// Exposes an attribute and schedules it to be stored on the entity.
#[derive(Debug)]
pub struct CreatePersistentAttributeAction {
    definition: ActionDefinition,
    attribute_name: String,
    expression: String,
    group: String,
}

pub(super) fn create_create_persistent_attribute(
    definition: ActionDefinition,
) -> Result<TranslationAction, RegistryError> {
    let group = optional_param(&definition, 2).unwrap_or_else(|| ROOT_GROUP.to_string());
    if !group.starts_with('/') {
        return Err(RegistryError::invalid_parameters(
            &definition.name,
            format!("group '{}' must be an absolute path", group),
        ));
    }
    Ok(output_action(CreatePersistentAttributeAction {
        attribute_name: required_param(&definition, 0)?,
        expression: required_param(&definition, 1)?,
        group,
        definition,
    }))
}

impl ActionDescriptor for CreatePersistentAttributeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for CreatePersistentAttributeAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        let Some(values) = evaluate_values(invocation, &self.expression)? else {
            return Ok(ExecutionFlow::Continue);
        };
        let attribute = Attribute::new(&self.attribute_name, &self.group, values)
            .with_origin(None, Some(invocation.profile));
        debug!(
            "Translation {} profile '{}' rule {}: created persistent attribute {}",
            invocation.translation_id, invocation.profile, invocation.rule_index, attribute
        );
        result.remove_attributes_by_name(ResultScope::Exposed, &self.attribute_name);
        result.add_attribute(DynamicAttribute::new(attribute.clone()));
        result.add_attribute_to_persist(attribute);
        Ok(ExecutionFlow::Continue)
    }
}

/// Exposes identities computed from an expression, optionally also
/// scheduling them to be stored on the entity.
#[derive(Debug)]
pub struct CreateIdentityAction {
    definition: ActionDefinition,
    identity_type: String,
    expression: String,
    persistent: bool,
}

fn create_identity_action(
    definition: ActionDefinition,
    persistent: bool,
) -> Result<TranslationAction, RegistryError> {
    Ok(output_action(CreateIdentityAction {
        identity_type: required_param(&definition, 0)?,
        expression: required_param(&definition, 1)?,
        persistent,
        definition,
    }))
}

pub(super) fn create_create_identity(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    create_identity_action(definition, false)
}

pub(super) fn create_create_persistent_identity(
    definition: ActionDefinition,
) -> Result<TranslationAction, RegistryError> {
    create_identity_action(definition, true)
}

impl ActionDescriptor for CreateIdentityAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for CreateIdentityAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        let Some(values) = evaluate_values(invocation, &self.expression)? else {
            return Ok(ExecutionFlow::Continue);
        };
        for value in values {
            let identity = IdentityParam::new(&self.identity_type, value)
                .with_origin(None, Some(invocation.profile));
            debug!(
                "Translation {} profile '{}' rule {}: created identity {}{}",
                invocation.translation_id,
                invocation.profile,
                invocation.rule_index,
                identity,
                if self.persistent { " (persistent)" } else { "" }
            );
            if self.persistent {
                result.add_identity_to_persist(identity.clone());
            }
            result.add_identity(identity);
        }
        Ok(ExecutionFlow::Continue)
    }
}

/// Removes attributes whose whole name matches a regex, from both the
/// exposed and the to-persist sets.
#[derive(Debug)]
pub struct FilterAttributeAction {
    definition: ActionDefinition,
    pattern: Regex,
}

pub(super) fn create_filter_attribute(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    let pattern = whole_match_regex(&definition, &required_param(&definition, 0)?)?;
    Ok(output_action(FilterAttributeAction {
        definition,
        pattern,
    }))
}

impl ActionDescriptor for FilterAttributeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for FilterAttributeAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        let mut removed = result.remove_attributes_matching(ResultScope::Exposed, &self.pattern);
        removed.extend(result.remove_attributes_matching(ResultScope::Persisted, &self.pattern));
        log_removed(invocation, "attributes", &removed.into_iter().collect::<Vec<_>>());
        Ok(ExecutionFlow::Continue)
    }
}

/// Removes attributes of one exact name.
#[derive(Debug)]
pub struct RemoveAttributeAction {
    definition: ActionDefinition,
    attribute_name: String,
}

pub(super) fn create_remove_attribute(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(output_action(RemoveAttributeAction {
        attribute_name: required_param(&definition, 0)?,
        definition,
    }))
}

impl ActionDescriptor for RemoveAttributeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for RemoveAttributeAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        let mut removed = result.remove_attributes_by_name(ResultScope::Exposed, &self.attribute_name);
        removed.extend(result.remove_attributes_by_name(ResultScope::Persisted, &self.attribute_name));
        log_removed(invocation, "attributes", &removed.into_iter().collect::<Vec<_>>());
        Ok(ExecutionFlow::Continue)
    }
}

/// Removes identities by type and/or whole-value regex. Without either
/// parameter every identity is removed.
#[derive(Debug)]
pub struct FilterIdentityAction {
    definition: ActionDefinition,
    identity_type: Option<String>,
    value_pattern: Option<Regex>,
}

pub(super) fn create_filter_identity(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    let value_pattern = optional_param(&definition, 1)
        .map(|p| whole_match_regex(&definition, &p))
        .transpose()?;
    Ok(output_action(FilterIdentityAction {
        identity_type: optional_param(&definition, 0),
        value_pattern,
        definition,
    }))
}

impl ActionDescriptor for FilterIdentityAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for FilterIdentityAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        let identity_type = self.identity_type.as_deref();
        let pattern = self.value_pattern.as_ref();
        let mut removed =
            result.remove_identities_matching(ResultScope::Exposed, identity_type, pattern);
        removed.extend(result.remove_identities_matching(
            ResultScope::Persisted,
            identity_type,
            pattern,
        ));
        let removed: Vec<String> = removed.iter().map(ToString::to_string).collect();
        log_removed(invocation, "identities", &removed);
        Ok(ExecutionFlow::Continue)
    }
}

/// Sets the URL the principal is redirected to after the exchange.
#[derive(Debug)]
pub struct RedirectAction {
    definition: ActionDefinition,
    expression: String,
}

pub(super) fn create_redirect(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(output_action(RedirectAction {
        expression: required_param(&definition, 0)?,
        definition,
    }))
}

impl ActionDescriptor for RedirectAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for RedirectAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        match invocation.evaluate(&self.expression)? {
            Value::Null => {}
            Value::Array(_) | Value::Object(_) => {
                return Err(ActionError::InvalidValue {
                    target: "redirect URL".to_string(),
                    message: "expression must evaluate to a single value".to_string(),
                });
            }
            url => {
                let url = display_value(&url);
                debug!(
                    "Translation {} profile '{}' rule {}: redirect to {}",
                    invocation.translation_id, invocation.profile, invocation.rule_index, url
                );
                result.set_redirect_url(url);
            }
        }
        Ok(ExecutionFlow::Continue)
    }
}

/// Runs another output profile against the shared result.
#[derive(Debug)]
pub struct IncludeOutputProfileAction {
    definition: ActionDefinition,
    profile: String,
}

pub(super) fn create_include_output(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(output_action(IncludeOutputProfileAction {
        profile: required_param(&definition, 0)?,
        definition,
    }))
}

impl ActionDescriptor for IncludeOutputProfileAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for IncludeOutputProfileAction {
    fn invoke(
        &self,
        input: &TranslationInput,
        invocation: &InvocationContext<'_>,
        result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        check_include_cycle(invocation, &self.profile)?;
        let profile = invocation.resolver.output_profile(&self.profile).ok_or_else(|| {
            ActionError::IncludedProfileMissing {
                profile: self.profile.clone(),
                direction: ProfileDirection::Output,
            }
        })?;
        debug!(
            "Translation {} profile '{}' rule {}: including output profile '{}'",
            invocation.translation_id, invocation.profile, invocation.rule_index, self.profile
        );
        profile
            .execute(
                input,
                invocation.variables,
                invocation.resolver,
                invocation.include_chain,
                invocation.translation_id,
                result,
            )
            .map_err(|e| ActionError::Nested(Box::new(e)))?;
        Ok(ExecutionFlow::Continue)
    }
}

/// Stops processing of the remaining rules.
#[derive(Debug)]
pub struct BreakOutputRulesAction {
    definition: ActionDefinition,
}

pub(super) fn create_break_output(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(output_action(BreakOutputRulesAction { definition }))
}

impl ActionDescriptor for BreakOutputRulesAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl OutputTranslationAction for BreakOutputRulesAction {
    fn invoke(
        &self,
        _input: &TranslationInput,
        _invocation: &InvocationContext<'_>,
        _result: &mut TranslationResult,
    ) -> Result<ExecutionFlow, ActionError> {
        Ok(ExecutionFlow::Break)
    }
}

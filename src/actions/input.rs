//! Actions of input profiles.

use super::{optional_param, parse_param, required_param, value_strings};
use crate::action::{
    ActionDefinition, ActionDescriptor, ActionParameter, InputTranslationAction,
    InvocationContext, MappingOutcome, ParameterKind, TranslationAction,
};
use crate::error::{ActionError, RegistryError};
use crate::model::{Attribute, IdentityParam, RemotelyAuthenticatedInput};
use crate::profile::ProfileDirection;
use crate::result::{
    AttributeEffectMode, EntityChange, EntityScheduledOperation, GroupEffectMode,
    IdentityEffectMode, MappedAttribute, MappedGroup, MappedIdentity, MappingResult,
};
use chrono::{TimeDelta, Utc};
use log::debug;
use std::sync::Arc;

const IDENTITY_EFFECTS: &[&str] = &["CREATE_OR_MATCH", "MATCH", "REQUIRE_MATCH", "UPDATE_OR_MATCH"];
const ATTRIBUTE_EFFECTS: &[&str] = &["CREATE_ONLY", "CREATE_OR_UPDATE", "UPDATE_ONLY"];
const GROUP_EFFECTS: &[&str] = &[
    "REQUIRE_EXISTING_GROUP",
    "ADD_IF_GROUP_EXISTS",
    "CREATE_GROUP_IF_MISSING",
];
const ENTITY_OPERATIONS: &[&str] = &["DISABLE", "REMOVE", "CLEAR"];

pub(super) static MAP_IDENTITY: [ActionParameter; 4] = [
    ActionParameter::required("identityType", ParameterKind::Text),
    ActionParameter::required("expression", ParameterKind::Expression),
    ActionParameter::optional("credentialRequirement", ParameterKind::Text),
    ActionParameter::optional("effect", ParameterKind::Enum(IDENTITY_EFFECTS)),
];

pub(super) static MAP_ATTRIBUTE: [ActionParameter; 4] = [
    ActionParameter::required("attributeName", ParameterKind::Text),
    ActionParameter::required("group", ParameterKind::Text),
    ActionParameter::required("expression", ParameterKind::Expression),
    ActionParameter::optional("effect", ParameterKind::Enum(ATTRIBUTE_EFFECTS)),
];

pub(super) static MAP_GROUP: [ActionParameter; 2] = [
    ActionParameter::required("expression", ParameterKind::Expression),
    ActionParameter::optional("groupEffect", ParameterKind::Enum(GROUP_EFFECTS)),
];

pub(super) static MULTI_MAP_ATTRIBUTE: [ActionParameter; 2] = [
    ActionParameter::required("mapping", ParameterKind::Text),
    ActionParameter::optional("effect", ParameterKind::Enum(ATTRIBUTE_EFFECTS)),
];

pub(super) static ENTITY_CHANGE: [ActionParameter; 2] = [
    ActionParameter::required("operation", ParameterKind::Enum(ENTITY_OPERATIONS)),
    ActionParameter::optional("scheduleDays", ParameterKind::Integer),
];

fn input_action(action: impl InputTranslationAction + 'static) -> TranslationAction {
    TranslationAction::Input(Arc::new(action))
}

fn log_nothing_mapped(invocation: &InvocationContext<'_>, action: &str, expression: &str) {
    debug!(
        "Translation {} profile '{}' rule {}: {} expression '{}' evaluated to null, nothing mapped",
        invocation.translation_id, invocation.profile, invocation.rule_index, action, expression
    );
}

/// Maps expression values to identities of one type.
#[derive(Debug)]
pub struct MapIdentityAction {
    definition: ActionDefinition,
    identity_type: String,
    expression: String,
    credential_requirement: Option<String>,
    effect: IdentityEffectMode,
}

pub(super) fn create_map_identity(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(input_action(MapIdentityAction {
        identity_type: required_param(&definition, 0)?,
        expression: required_param(&definition, 1)?,
        credential_requirement: optional_param(&definition, 2),
        effect: parse_param(&definition, 3, IdentityEffectMode::CreateOrMatch)?,
        definition,
    }))
}

impl ActionDescriptor for MapIdentityAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for MapIdentityAction {
    fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        let value = invocation.evaluate(&self.expression)?;
        let mut result = MappingResult::new();
        for identity in value_strings(&value) {
            debug!(
                "Translation {} profile '{}' rule {}: mapped identity [{}] {} ({})",
                invocation.translation_id,
                invocation.profile,
                invocation.rule_index,
                self.identity_type,
                identity,
                self.effect
            );
            result.add_identity(MappedIdentity {
                mode: self.effect,
                identity: IdentityParam::new(&self.identity_type, identity)
                    .with_origin(Some(&input.idp), Some(invocation.profile)),
                credential_requirement: self.credential_requirement.clone(),
            });
        }
        if value.is_null() {
            log_nothing_mapped(invocation, self.name(), &self.expression);
        }
        Ok(MappingOutcome::proceed(result))
    }
}

/// Maps an expression value to a local attribute in a group.
#[derive(Debug)]
pub struct MapAttributeAction {
    definition: ActionDefinition,
    attribute_name: String,
    group: String,
    expression: String,
    effect: AttributeEffectMode,
}

pub(super) fn create_map_attribute(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    let group = required_param(&definition, 1)?;
    if !group.starts_with('/') {
        return Err(RegistryError::invalid_parameters(
            &definition.name,
            format!("group '{}' must be an absolute path", group),
        ));
    }
    Ok(input_action(MapAttributeAction {
        attribute_name: required_param(&definition, 0)?,
        group,
        expression: required_param(&definition, 2)?,
        effect: parse_param(&definition, 3, AttributeEffectMode::CreateOrUpdate)?,
        definition,
    }))
}

impl ActionDescriptor for MapAttributeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for MapAttributeAction {
    fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        let value = invocation.evaluate(&self.expression)?;
        let mut result = MappingResult::new();
        if value.is_null() {
            log_nothing_mapped(invocation, self.name(), &self.expression);
            return Ok(MappingOutcome::proceed(result));
        }
        let attribute = Attribute::new(&self.attribute_name, &self.group, value_strings(&value))
            .with_origin(Some(&input.idp), Some(invocation.profile));
        debug!(
            "Translation {} profile '{}' rule {}: mapped attribute {} ({})",
            invocation.translation_id,
            invocation.profile,
            invocation.rule_index,
            attribute,
            self.effect
        );
        result.add_attribute(MappedAttribute {
            mode: self.effect,
            attribute,
        });
        Ok(MappingOutcome::proceed(result))
    }
}

/// Maps expression values to group memberships.
#[derive(Debug)]
pub struct MapGroupAction {
    definition: ActionDefinition,
    expression: String,
    effect: GroupEffectMode,
}

pub(super) fn create_map_group(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(input_action(MapGroupAction {
        expression: required_param(&definition, 0)?,
        effect: parse_param(&definition, 1, GroupEffectMode::RequireExistingGroup)?,
        definition,
    }))
}

impl ActionDescriptor for MapGroupAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for MapGroupAction {
    fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        let value = invocation.evaluate(&self.expression)?;
        let mut result = MappingResult::new();
        for group in value_strings(&value) {
            if !group.starts_with('/') {
                return Err(ActionError::InvalidValue {
                    target: "group".to_string(),
                    message: format!("'{}' is not an absolute group path", group),
                });
            }
            debug!(
                "Translation {} profile '{}' rule {}: mapped group {} ({})",
                invocation.translation_id,
                invocation.profile,
                invocation.rule_index,
                group,
                self.effect
            );
            result.add_group(MappedGroup {
                group,
                create_if_missing: self.effect,
                idp: input.idp.clone(),
                profile: invocation.profile.to_string(),
            });
        }
        if value.is_null() {
            log_nothing_mapped(invocation, self.name(), &self.expression);
        }
        Ok(MappingOutcome::proceed(result))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMapping {
    remote: String,
    local: String,
    group: String,
}

/// Copies many remote attributes at once. The mapping parameter holds one
/// `remote:local:group` entry per line.
#[derive(Debug)]
pub struct MultiMapAttributeAction {
    definition: ActionDefinition,
    mappings: Vec<AttributeMapping>,
    effect: AttributeEffectMode,
}

pub(super) fn create_multi_map_attribute(
    definition: ActionDefinition,
) -> Result<TranslationAction, RegistryError> {
    let raw = required_param(&definition, 0)?;
    let mut mappings = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [remote, local, group]
                if !remote.is_empty() && !local.is_empty() && group.starts_with('/') =>
            {
                mappings.push(AttributeMapping {
                    remote: remote.to_string(),
                    local: local.to_string(),
                    group: group.to_string(),
                });
            }
            _ => {
                return Err(RegistryError::invalid_parameters(
                    &definition.name,
                    format!("mapping line '{}' is not of the form remote:local:/group", line),
                ));
            }
        }
    }
    Ok(input_action(MultiMapAttributeAction {
        mappings,
        effect: parse_param(&definition, 1, AttributeEffectMode::CreateOrUpdate)?,
        definition,
    }))
}

impl ActionDescriptor for MultiMapAttributeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for MultiMapAttributeAction {
    fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        let mut result = MappingResult::new();
        for mapping in &self.mappings {
            let Some(remote) = input.attribute(&mapping.remote) else {
                debug!(
                    "Translation {} profile '{}' rule {}: remote attribute {} absent, skipped",
                    invocation.translation_id, invocation.profile, invocation.rule_index, mapping.remote
                );
                continue;
            };
            result.add_attribute(MappedAttribute {
                mode: self.effect,
                attribute: Attribute::new(&mapping.local, &mapping.group, remote.values.iter().cloned())
                    .with_origin(Some(&input.idp), Some(invocation.profile)),
            });
        }
        Ok(MappingOutcome::proceed(result))
    }
}

/// Schedules a lifecycle operation on the mapped entity, or clears one.
#[derive(Debug)]
pub struct EntityChangeAction {
    definition: ActionDefinition,
    operation: Option<EntityScheduledOperation>,
    schedule_days: i64,
}

pub(super) fn create_entity_change(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    let operation = match required_param(&definition, 0)?.as_str() {
        "CLEAR" => None,
        other => Some(
            other
                .parse::<EntityScheduledOperation>()
                .map_err(|e| RegistryError::invalid_parameters(&definition.name, e.to_string()))?,
        ),
    };
    let schedule_days = parse_param(&definition, 1, 0i64)?;
    if schedule_days < 0 {
        return Err(RegistryError::invalid_parameters(
            &definition.name,
            "scheduleDays must not be negative",
        ));
    }
    Ok(input_action(EntityChangeAction {
        definition,
        operation,
        schedule_days,
    }))
}

impl ActionDescriptor for EntityChangeAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for EntityChangeAction {
    fn invoke(
        &self,
        _input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        let scheduled_time = match self.operation {
            Some(_) => {
                let delay = TimeDelta::try_days(self.schedule_days).ok_or_else(|| {
                    ActionError::InvalidValue {
                        target: "scheduleDays".to_string(),
                        message: format!("{} days is out of range", self.schedule_days),
                    }
                })?;
                Some(Utc::now() + delay)
            }
            None => None,
        };
        debug!(
            "Translation {} profile '{}' rule {}: entity change {:?} at {:?}",
            invocation.translation_id,
            invocation.profile,
            invocation.rule_index,
            self.operation,
            scheduled_time
        );
        let mut result = MappingResult::new();
        result.add_entity_change(EntityChange {
            scheduled_operation: self.operation,
            scheduled_time,
        });
        Ok(MappingOutcome::proceed(result))
    }
}

/// Requests removal of previously imported data this run did not map.
#[derive(Debug)]
pub struct RemoveStaleDataAction {
    definition: ActionDefinition,
}

pub(super) fn create_remove_stale_data(
    definition: ActionDefinition,
) -> Result<TranslationAction, RegistryError> {
    Ok(input_action(RemoveStaleDataAction { definition }))
}

impl ActionDescriptor for RemoveStaleDataAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for RemoveStaleDataAction {
    fn invoke(
        &self,
        _input: &RemotelyAuthenticatedInput,
        _invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        let mut result = MappingResult::new();
        result.clean_stale_data();
        Ok(MappingOutcome::proceed(result))
    }
}

/// Runs another input profile and merges its result.
#[derive(Debug)]
pub struct IncludeInputProfileAction {
    definition: ActionDefinition,
    profile: String,
}

pub(super) fn create_include_input(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(input_action(IncludeInputProfileAction {
        profile: required_param(&definition, 0)?,
        definition,
    }))
}

impl ActionDescriptor for IncludeInputProfileAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for IncludeInputProfileAction {
    fn invoke(
        &self,
        input: &RemotelyAuthenticatedInput,
        invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        super::check_include_cycle(invocation, &self.profile)?;
        let profile = invocation.resolver.input_profile(&self.profile).ok_or_else(|| {
            ActionError::IncludedProfileMissing {
                profile: self.profile.clone(),
                direction: ProfileDirection::Input,
            }
        })?;
        debug!(
            "Translation {} profile '{}' rule {}: including input profile '{}'",
            invocation.translation_id, invocation.profile, invocation.rule_index, self.profile
        );
        let result = profile
            .execute(
                input,
                invocation.variables,
                invocation.resolver,
                invocation.include_chain,
                invocation.translation_id,
            )
            .map_err(|e| ActionError::Nested(Box::new(e)))?;
        Ok(MappingOutcome::proceed(result))
    }
}

/// Stops processing of the remaining rules.
#[derive(Debug)]
pub struct BreakInputRulesAction {
    definition: ActionDefinition,
}

pub(crate) fn create_break_input(definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
    Ok(input_action(BreakInputRulesAction { definition }))
}

impl ActionDescriptor for BreakInputRulesAction {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }
}

impl InputTranslationAction for BreakInputRulesAction {
    fn invoke(
        &self,
        _input: &RemotelyAuthenticatedInput,
        _invocation: &InvocationContext<'_>,
    ) -> Result<MappingOutcome, ActionError> {
        Ok(MappingOutcome::halt(MappingResult::new()))
    }
}

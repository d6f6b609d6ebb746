//! Conversion of legacy (unversioned) input profiles.
//!
//! Legacy profiles split identity creation, attribute and group updates into
//! `createUser`, `updateAttributes` and `updateGroups` rules whose conditions
//! gated the mapping rules. The conversion attaches those conditions to the
//! rewritten mapping actions and drops mappings whose gate is missing.
//!
//! An unversioned document counts as legacy only when it uses one of those
//! gates or a legacy-only action; anything else is read as the current
//! format.

use super::{PROFILE_FORMAT_VERSION, ProfileDefinition, ProfileDirection, ProfileMode, RuleDefinition};
use crate::action::ActionDefinition;
use crate::error::ProfileError;
use crate::rule::TranslationCondition;
use log::warn;
use serde_json::Value;

/// Actions that exist only in the legacy format.
const LEGACY_ACTIONS: &[&str] = &[
    "createUser",
    "updateAttributes",
    "updateGroups",
    "mapIdentityByType",
    "mapAttributeToIdentity",
];

pub(super) fn is_legacy(document: &Value) -> bool {
    document
        .get("rules")
        .and_then(Value::as_array)
        .is_some_and(|rules| {
            rules.iter().any(|rule| {
                rule.pointer("/action/name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| LEGACY_ACTIONS.contains(&name))
            })
        })
}

/// Optional enum field of the document.
fn optional_field<T: serde::de::DeserializeOwned>(
    document: &Value,
    field: &str,
) -> Result<Option<T>, ProfileError> {
    document
        .get(field)
        .map(|value| serde_json::from_value(value.clone()))
        .transpose()
        .map_err(ProfileError::from)
}

struct LegacyRule {
    condition: String,
    action: String,
    parameters: Vec<String>,
}

impl LegacyRule {
    fn parameter(&self, index: usize, rule: usize) -> Result<&str, ProfileError> {
        self.parameters.get(index).map(String::as_str).ok_or_else(|| {
            ProfileError::MissingField(format!("rules[{}].action.parameters[{}]", rule, index))
        })
    }
}

fn parse_rule(index: usize, rule: &Value) -> Result<LegacyRule, ProfileError> {
    let condition = rule
        .pointer("/condition/conditionValue")
        .and_then(Value::as_str)
        .unwrap_or("true")
        .to_string();
    let action = rule
        .pointer("/action/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ProfileError::MissingField(format!("rules[{}].action.name", index)))?
        .to_string();
    let parameters = rule
        .pointer("/action/parameters")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .map(|p| p.as_str().map_or_else(|| p.to_string(), str::to_string))
                .collect()
        })
        .unwrap_or_default();
    Ok(LegacyRule {
        condition,
        action,
        parameters,
    })
}

fn rule(condition: &str, action: &str, parameters: Vec<String>) -> RuleDefinition {
    RuleDefinition {
        condition: TranslationCondition::new(condition),
        action: ActionDefinition::new(action, parameters),
    }
}

/// Convert a legacy document to the current format.
pub(super) fn convert(old: &Value) -> Result<ProfileDefinition, ProfileError> {
    let name = old
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ProfileError::MissingField("name".to_string()))?
        .to_string();
    warn!(
        "Translation profile '{}' is in the legacy format and is converted; verify the result, \
         especially group and identity mappings. Original: {}",
        name, old
    );

    let legacy_rules = old
        .get("rules")
        .and_then(Value::as_array)
        .map(|rules| {
            rules
                .iter()
                .enumerate()
                .map(|(i, r)| parse_rule(i, r))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let gate = |action: &str| {
        legacy_rules
            .iter()
            .rev()
            .find(|r| r.action == action)
            .map(|r| r.condition.clone())
    };
    let create_user = gate("createUser");
    let update_attributes = gate("updateAttributes");
    let update_groups = gate("updateGroups");

    let mut rules = Vec::new();
    for (index, old_rule) in legacy_rules.iter().enumerate() {
        let p = |i| old_rule.parameter(i, index);
        match (old_rule.action.as_str(), &create_user, &update_attributes, &update_groups) {
            ("mapIdentityByType", Some(cond), _, _) => rules.push(rule(
                cond,
                "mapIdentity",
                vec![
                    p(1)?.to_string(),
                    format!("idsByType['{}']", p(0)?),
                    p(2)?.to_string(),
                    "CREATE_OR_MATCH".to_string(),
                ],
            )),
            ("mapAttributeToIdentity", Some(cond), _, _) => rules.push(rule(
                cond,
                "mapIdentity",
                vec![
                    p(1)?.to_string(),
                    format!("attr['{}']", p(0)?),
                    p(2)?.to_string(),
                    "CREATE_OR_MATCH".to_string(),
                ],
            )),
            ("mapIdentity", Some(cond), _, _) => {
                warn!(
                    "Profile '{}': identity mapping {} -> {} now maps the default remote identity to type identifier",
                    name,
                    p(0)?,
                    p(1)?
                );
                rules.push(rule(
                    cond,
                    "mapIdentity",
                    vec![
                        "identifier".to_string(),
                        "id".to_string(),
                        p(2)?.to_string(),
                        "CREATE_OR_MATCH".to_string(),
                    ],
                ));
            }
            ("mapAttribute", _, Some(cond), _) => {
                let attribute = if p(1)? == "$1" { p(0)? } else { p(1)? };
                rules.push(rule(
                    cond,
                    "mapAttribute",
                    vec![
                        attribute.to_string(),
                        p(2)?.to_string(),
                        format!("attr['{}']", p(0)?),
                        "CREATE_OR_UPDATE".to_string(),
                    ],
                ));
            }
            ("mapGroup", _, _, Some(cond)) => {
                let group = if p(1)? == "$1" { p(0)? } else { p(1)? };
                warn!("Profile '{}': re-check the group mapping to {}", name, group);
                rules.push(rule(cond, "mapGroup", vec![format!("'{}'", group)]));
            }
            _ => {}
        }
    }

    Ok(ProfileDefinition {
        ver: Some(PROFILE_FORMAT_VERSION.to_string()),
        name,
        description: old
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        direction: optional_field::<ProfileDirection>(old, "direction")?,
        mode: Some(optional_field::<ProfileMode>(old, "mode")?.unwrap_or_default()),
        rules,
    })
}

//! Accumulator of output translation.

use crate::model::{Attribute, IdentityParam, TranslationInput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An exposed attribute with its presentation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicAttribute {
    pub attribute: Attribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
}

impl DynamicAttribute {
    pub fn new(attribute: Attribute) -> Self {
        Self {
            attribute,
            display_name: None,
            description: None,
            mandatory: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.attribute.name
    }
}

impl From<Attribute> for DynamicAttribute {
    fn from(attribute: Attribute) -> Self {
        Self::new(attribute)
    }
}

/// Which side of a [`TranslationResult`] an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultScope {
    /// Data released to the relying party
    Exposed,
    /// Data written back to the local store
    Persisted,
}

/// Everything the rules of an output profile produced.
///
/// Attribute collections behave as sets: adding a value equal to one already
/// present is a no-op. Identity collections keep duplicates out the same way
/// but preserve insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    attributes: Vec<DynamicAttribute>,
    identities: Vec<IdentityParam>,
    attributes_to_persist: Vec<Attribute>,
    identities_to_persist: Vec<IdentityParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
}

impl TranslationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result pre-populated with the entity's own identities and attributes,
    /// for deployments that expose everything unless a rule filters it.
    pub fn from_input(input: &TranslationInput) -> Self {
        let mut result = Self::new();
        for identity in &input.entity.identities {
            result.add_identity(identity.clone());
        }
        for attribute in &input.attributes {
            result.add_attribute(DynamicAttribute::new(attribute.clone()));
        }
        result
    }

    pub fn attributes(&self) -> &[DynamicAttribute] {
        &self.attributes
    }

    pub fn identities(&self) -> &[IdentityParam] {
        &self.identities
    }

    pub fn attributes_to_persist(&self) -> &[Attribute] {
        &self.attributes_to_persist
    }

    pub fn identities_to_persist(&self) -> &[IdentityParam] {
        &self.identities_to_persist
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Exposed attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&DynamicAttribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Returns `false` when an equal attribute was already exposed.
    pub fn add_attribute(&mut self, attribute: DynamicAttribute) -> bool {
        insert_unique(&mut self.attributes, attribute)
    }

    pub fn add_identity(&mut self, identity: IdentityParam) -> bool {
        insert_unique(&mut self.identities, identity)
    }

    pub fn add_attribute_to_persist(&mut self, attribute: Attribute) -> bool {
        insert_unique(&mut self.attributes_to_persist, attribute)
    }

    pub fn add_identity_to_persist(&mut self, identity: IdentityParam) -> bool {
        insert_unique(&mut self.identities_to_persist, identity)
    }

    pub fn set_redirect_url(&mut self, url: impl Into<String>) {
        self.redirect_url = Some(url.into());
    }

    /// Remove attributes with exactly this name. Returns the removed names.
    pub fn remove_attributes_by_name(&mut self, scope: ResultScope, name: &str) -> BTreeSet<String> {
        self.remove_attributes_where(scope, |n| n == name)
    }

    /// Remove attributes whose name matches `pattern`. Returns the removed
    /// names. Anchor the pattern to match whole names only.
    pub fn remove_attributes_matching(
        &mut self,
        scope: ResultScope,
        pattern: &Regex,
    ) -> BTreeSet<String> {
        self.remove_attributes_where(scope, |n| pattern.is_match(n))
    }

    /// Remove identities of the given type. Returns the removed identities.
    pub fn remove_identities_of_type(
        &mut self,
        scope: ResultScope,
        type_id: &str,
    ) -> Vec<IdentityParam> {
        self.remove_identities_where(scope, |i| i.type_id == type_id)
    }

    /// Remove identities whose type (when `type_id` is given) and value (when
    /// `value_pattern` is given) match. Returns the removed identities.
    pub fn remove_identities_matching(
        &mut self,
        scope: ResultScope,
        type_id: Option<&str>,
        value_pattern: Option<&Regex>,
    ) -> Vec<IdentityParam> {
        self.remove_identities_where(scope, |i| {
            type_id.is_none_or(|t| i.type_id == t)
                && value_pattern.is_none_or(|p| p.is_match(&i.value))
        })
    }

    fn remove_attributes_where(
        &mut self,
        scope: ResultScope,
        matches: impl Fn(&str) -> bool,
    ) -> BTreeSet<String> {
        let mut removed = BTreeSet::new();
        match scope {
            ResultScope::Exposed => self.attributes.retain(|a| {
                let hit = matches(a.name());
                if hit {
                    removed.insert(a.name().to_string());
                }
                !hit
            }),
            ResultScope::Persisted => self.attributes_to_persist.retain(|a| {
                let hit = matches(&a.name);
                if hit {
                    removed.insert(a.name.clone());
                }
                !hit
            }),
        }
        removed
    }

    fn remove_identities_where(
        &mut self,
        scope: ResultScope,
        matches: impl Fn(&IdentityParam) -> bool,
    ) -> Vec<IdentityParam> {
        let target = match scope {
            ResultScope::Exposed => &mut self.identities,
            ResultScope::Persisted => &mut self.identities_to_persist,
        };
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(target).into_iter().partition(|i| matches(i));
        *target = kept;
        removed
    }
}

fn insert_unique<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
    if items.contains(&item) {
        return false;
    }
    items.push(item);
    true
}

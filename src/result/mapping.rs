//! Accumulator of input translation.

use crate::model::{Attribute, IdentityParam};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a mapped identity is reconciled with the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityEffectMode {
    /// Match an existing identity, or create it (with a new entity if needed)
    CreateOrMatch,
    /// Match an existing identity, never create
    Match,
    /// The identity must exist locally
    RequireMatch,
    /// Match, or add the identity to an entity matched by another identity
    UpdateOrMatch,
}

impl IdentityEffectMode {
    pub const ALL: [Self; 4] = [
        Self::CreateOrMatch,
        Self::Match,
        Self::RequireMatch,
        Self::UpdateOrMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOrMatch => "CREATE_OR_MATCH",
            Self::Match => "MATCH",
            Self::RequireMatch => "REQUIRE_MATCH",
            Self::UpdateOrMatch => "UPDATE_OR_MATCH",
        }
    }
}

/// How a mapped attribute is written to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeEffectMode {
    /// Only create the attribute when it is absent
    CreateOnly,
    /// Create or overwrite
    CreateOrUpdate,
    /// Only overwrite an attribute that is already present
    UpdateOnly,
}

impl AttributeEffectMode {
    pub const ALL: [Self; 3] = [Self::CreateOnly, Self::CreateOrUpdate, Self::UpdateOnly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOnly => "CREATE_ONLY",
            Self::CreateOrUpdate => "CREATE_OR_UPDATE",
            Self::UpdateOnly => "UPDATE_ONLY",
        }
    }
}

/// What happens to a group assignment whose target group does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupEffectMode {
    /// Fail the reconciliation
    RequireExistingGroup,
    /// Silently skip the assignment
    AddIfGroupExists,
    /// Create the group, then assign
    CreateGroupIfMissing,
}

impl GroupEffectMode {
    pub const ALL: [Self; 3] = [
        Self::RequireExistingGroup,
        Self::AddIfGroupExists,
        Self::CreateGroupIfMissing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequireExistingGroup => "REQUIRE_EXISTING_GROUP",
            Self::AddIfGroupExists => "ADD_IF_GROUP_EXISTS",
            Self::CreateGroupIfMissing => "CREATE_GROUP_IF_MISSING",
        }
    }
}

/// Lifecycle operation scheduled on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityScheduledOperation {
    Disable,
    Remove,
}

impl EntityScheduledOperation {
    pub const ALL: [Self; 2] = [Self::Disable, Self::Remove];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "DISABLE",
            Self::Remove => "REMOVE",
        }
    }
}

/// Error for an unknown enum constant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not one of: {}", allowed.join(", "))]
pub struct UnknownConstant {
    pub value: String,
    pub allowed: Vec<&'static str>,
}

macro_rules! constant_enum_impls {
    ($($ty:ty),*) => {$(
        impl FromStr for $ty {
            type Err = UnknownConstant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|mode| mode.as_str() == s)
                    .ok_or_else(|| UnknownConstant {
                        value: s.to_string(),
                        allowed: Self::ALL.iter().map(|m| m.as_str()).collect(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

constant_enum_impls!(
    IdentityEffectMode,
    AttributeEffectMode,
    GroupEffectMode,
    EntityScheduledOperation
);

/// Identity produced by an input action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedIdentity {
    pub mode: IdentityEffectMode,
    pub identity: IdentityParam,
    #[serde(default)]
    pub credential_requirement: Option<String>,
}

/// Attribute produced by an input action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedAttribute {
    pub mode: AttributeEffectMode,
    pub attribute: Attribute,
}

/// Group assignment produced by an input action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedGroup {
    /// Full group path, e.g. `/staff/dev`
    pub group: String,
    pub create_if_missing: GroupEffectMode,
    pub idp: String,
    pub profile: String,
}

/// Scheduled lifecycle change of the mapped entity. `None` operation clears
/// a previously scheduled change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityChange {
    pub scheduled_operation: Option<EntityScheduledOperation>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Everything the rules of an input profile mapped.
///
/// An append-only accumulator: [`merge_with`](Self::merge_with) concatenates
/// and never deduplicates, so two rules mapping the same value produce two
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub groups: Vec<MappedGroup>,
    pub identities: Vec<MappedIdentity>,
    pub attributes: Vec<MappedAttribute>,
    pub entity_changes: Vec<EntityChange>,
    pub clean_stale_attributes: bool,
    pub clean_stale_identities: bool,
    pub clean_stale_groups: bool,
}

impl MappingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, group: MappedGroup) {
        self.groups.push(group);
    }

    pub fn add_identity(&mut self, identity: MappedIdentity) {
        self.identities.push(identity);
    }

    pub fn add_attribute(&mut self, attribute: MappedAttribute) {
        self.attributes.push(attribute);
    }

    pub fn add_entity_change(&mut self, change: EntityChange) {
        self.entity_changes.push(change);
    }

    /// Request removal of data previously imported from the same source and
    /// not mapped this time.
    pub fn clean_stale_data(&mut self) {
        self.clean_stale_attributes = true;
        self.clean_stale_identities = true;
        self.clean_stale_groups = true;
    }

    /// Append everything from `other`. Clean-stale flags are sticky: once set
    /// by any merged result they stay set.
    pub fn merge_with(&mut self, other: MappingResult) {
        self.groups.extend(other.groups);
        self.identities.extend(other.identities);
        self.attributes.extend(other.attributes);
        self.entity_changes.extend(other.entity_changes);
        self.clean_stale_attributes |= other.clean_stale_attributes;
        self.clean_stale_identities |= other.clean_stale_identities;
        self.clean_stale_groups |= other.clean_stale_groups;
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.identities.is_empty()
            && self.attributes.is_empty()
            && self.entity_changes.is_empty()
    }

    /// Mapped attributes assigned to one group.
    pub fn attributes_in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Attribute> + 'a {
        self.attributes
            .iter()
            .map(|m| &m.attribute)
            .filter(move |a| a.group_path == group)
    }
}

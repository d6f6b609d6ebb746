//! Identity and attribute types exchanged with the translation engine.
//!
//! - [`RemotelyAuthenticatedInput`] - what a remote identity provider asserted
//! - [`TranslationInput`] - snapshot of a local entity being exposed to a relying party
//! - [`IdentityParam`] / [`Attribute`] - the values both directions produce

mod local;
mod remote;

pub use local::{EntitySnapshot, LoginContext, TranslationInput};
pub use remote::{RemoteAttribute, RemoteGroup, RemoteIdentity, RemotelyAuthenticatedInput};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of the root group every entity belongs to.
pub const ROOT_GROUP: &str = "/";

/// Identifier of a local entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// An identity value of a given type, optionally stamped with the remote
/// IdP and translation profile that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityParam {
    pub type_id: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_idp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_profile: Option<String>,
}

impl IdentityParam {
    pub fn new(type_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            value: value.into(),
            remote_idp: None,
            translation_profile: None,
        }
    }

    /// Stamp the identity with its origin.
    pub fn with_origin(mut self, remote_idp: Option<&str>, profile: Option<&str>) -> Self {
        self.remote_idp = remote_idp.map(str::to_string);
        self.translation_profile = profile.map(str::to_string);
        self
    }

    /// Whether two identities denote the same principal (type and value),
    /// regardless of origin.
    pub fn same_identity(&self, other: &IdentityParam) -> bool {
        self.type_id == other.type_id && self.value == other.value
    }
}

impl fmt::Display for IdentityParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.type_id, self.value)
    }
}

/// A named, multi-valued attribute in a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub group_path: String,
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_idp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_profile: Option<String>,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        group_path: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            group_path: group_path.into(),
            values: values.into_iter().map(Into::into).collect(),
            remote_idp: None,
            translation_profile: None,
        }
    }

    /// Stamp the attribute with its origin.
    pub fn with_origin(mut self, remote_idp: Option<&str>, profile: Option<&str>) -> Self {
        self.remote_idp = remote_idp.map(str::to_string);
        self.translation_profile = profile.map(str::to_string);
        self
    }

    /// Whether the attribute occupies the same slot (name and group).
    pub fn same_slot(&self, other: &Attribute) -> bool {
        self.name == other.name && self.group_path == other.group_path
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}: [{}]",
            self.name,
            self.group_path,
            self.values.join(", ")
        )
    }
}

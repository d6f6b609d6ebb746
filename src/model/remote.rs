//! Data asserted by a remote identity provider.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// An attribute received from a remote IdP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttribute {
    pub name: String,
    pub values: Vec<String>,
}

/// An identity received from a remote IdP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIdentity {
    pub identity_type: String,
    pub name: String,
}

/// A group membership asserted by a remote IdP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGroup {
    pub name: String,
}

/// Everything a remote IdP asserted about a principal.
///
/// Collections keep the order in which the IdP delivered the data; the first
/// identity is the principal's default identity (`id`/`idType` in the
/// context).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotelyAuthenticatedInput {
    pub idp: String,
    #[serde(default)]
    pub attributes: Vec<RemoteAttribute>,
    #[serde(default)]
    pub identities: Vec<RemoteIdentity>,
    #[serde(default)]
    pub groups: Vec<RemoteGroup>,
}

impl RemotelyAuthenticatedInput {
    pub fn new(idp: impl Into<String>) -> Self {
        Self {
            idp: idp.into(),
            ..Default::default()
        }
    }

    /// Add an attribute, replacing an earlier attribute of the same name.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let attribute = RemoteAttribute {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        };
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    pub fn with_identity(
        mut self,
        identity_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.identities.push(RemoteIdentity {
            identity_type: identity_type.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(RemoteGroup { name: name.into() });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&RemoteAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Multi-line human readable dump for trace logging.
    pub fn text_dump(&self) -> String {
        let mut dump = String::new();
        for identity in &self.identities {
            let _ = writeln!(dump, "Identity: {} ({})", identity.name, identity.identity_type);
        }
        for attribute in &self.attributes {
            let _ = writeln!(dump, "Attribute: {}={:?}", attribute.name, attribute.values);
        }
        for group in &self.groups {
            let _ = writeln!(dump, "Group: {}", group.name);
        }
        dump
    }
}

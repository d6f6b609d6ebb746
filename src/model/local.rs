//! Local entity data fed into output translation.

use super::{Attribute, EntityId, IdentityParam, ROOT_GROUP};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Read-only copy of a local entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    #[serde(default)]
    pub identities: Vec<IdentityParam>,
}

impl EntitySnapshot {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            identities: Vec::new(),
        }
    }

    pub fn with_identity(mut self, identity: IdentityParam) -> Self {
        self.identities.push(identity);
        self
    }
}

/// Facts about the login session the output translation runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginContext {
    /// Identities the principal authenticated with
    #[serde(default)]
    pub authenticated_with: Vec<String>,
    /// Remote IdP that authenticated the session, `None` for local logins
    #[serde(default)]
    pub remote_idp: Option<String>,
    /// Authenticators used, first factor first
    #[serde(default)]
    pub authenticators: Vec<String>,
    /// Authentication context class references reported upstream
    #[serde(default)]
    pub upstream_acrs: Vec<String>,
    #[serde(default)]
    pub upstream_protocol: Option<String>,
    #[serde(default)]
    pub upstream_idp: Option<String>,
}

/// Input of an output translation: the entity, the data released in the
/// chosen group, and the request it is released for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationInput {
    pub entity: EntitySnapshot,
    /// Attributes of the entity in the chosen group
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Paths of all groups the entity belongs to
    #[serde(default)]
    pub groups: Vec<String>,
    pub chosen_group: String,
    pub protocol: String,
    #[serde(default)]
    pub protocol_subtype: String,
    pub requester: String,
    #[serde(default)]
    pub requester_attributes: Vec<Attribute>,
    /// Status of user import per importer, as reported by the caller
    #[serde(default)]
    pub import_status: BTreeMap<String, String>,
    #[serde(default)]
    pub login: Option<LoginContext>,
}

impl TranslationInput {
    pub fn new(
        entity: EntitySnapshot,
        protocol: impl Into<String>,
        requester: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            attributes: Vec::new(),
            groups: vec![ROOT_GROUP.to_string()],
            chosen_group: ROOT_GROUP.to_string(),
            protocol: protocol.into(),
            protocol_subtype: String::new(),
            requester: requester.into(),
            requester_attributes: Vec::new(),
            import_status: BTreeMap::new(),
            login: None,
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    pub fn with_chosen_group(mut self, group: impl Into<String>) -> Self {
        self.chosen_group = group.into();
        self
    }

    pub fn with_protocol_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.protocol_subtype = subtype.into();
        self
    }

    pub fn with_requester_attribute(mut self, attribute: Attribute) -> Self {
        self.requester_attributes.push(attribute);
        self
    }

    pub fn with_import_status(mut self, importer: impl Into<String>, status: impl Into<String>) -> Self {
        self.import_status.insert(importer.into(), status.into());
        self
    }

    pub fn with_login(mut self, login: LoginContext) -> Self {
        self.login = Some(login);
        self
    }

    /// Multi-line human readable dump for trace logging.
    pub fn text_dump(&self) -> String {
        let mut dump = String::new();
        let _ = writeln!(dump, "Entity: {}", self.entity.id);
        for identity in &self.entity.identities {
            let _ = writeln!(dump, "Identity: {}", identity);
        }
        for attribute in &self.attributes {
            let _ = writeln!(dump, "Attribute: {}", attribute);
        }
        let _ = writeln!(dump, "Groups: {}", self.groups.join(", "));
        let _ = writeln!(
            dump,
            "Requester: {} via {} {}",
            self.requester, self.protocol, self.protocol_subtype
        );
        dump
    }
}

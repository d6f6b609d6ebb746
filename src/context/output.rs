//! Context of output translation, built from a local entity snapshot.

use super::{TranslationContext, attribute_maps, group_values, string_list};
use crate::model::TranslationInput;
use serde_json::{Map, Value};

/// Value of `idp` when the session was authenticated locally.
pub const LOCAL_IDP: &str = "_LOCAL";

/// Value of `upstreamProtocol` when no upstream protocol is known.
pub const DEFAULT_UPSTREAM_PROTOCOL: &str = "local";

/// Variables available to output translation expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContextKey {
    Protocol,
    ProtocolSubtype,
    Requester,
    Attr,
    Attrs,
    RequesterAttr,
    RequesterAttrs,
    IdsByType,
    ImportStatus,
    Groups,
    UsedGroup,
    SubGroups,
    AuthenticatedWith,
    Idp,
    Authentications,
    Mfa,
    UpstreamAcrs,
    UpstreamProtocol,
    UpstreamIdp,
}

impl OutputContextKey {
    pub const ALL: [OutputContextKey; 19] = [
        Self::Protocol,
        Self::ProtocolSubtype,
        Self::Requester,
        Self::Attr,
        Self::Attrs,
        Self::RequesterAttr,
        Self::RequesterAttrs,
        Self::IdsByType,
        Self::ImportStatus,
        Self::Groups,
        Self::UsedGroup,
        Self::SubGroups,
        Self::AuthenticatedWith,
        Self::Idp,
        Self::Authentications,
        Self::Mfa,
        Self::UpstreamAcrs,
        Self::UpstreamProtocol,
        Self::UpstreamIdp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::ProtocolSubtype => "protocolSubtype",
            Self::Requester => "requester",
            Self::Attr => "attr",
            Self::Attrs => "attrs",
            Self::RequesterAttr => "requesterAttr",
            Self::RequesterAttrs => "requesterAttrs",
            Self::IdsByType => "idsByType",
            Self::ImportStatus => "importStatus",
            Self::Groups => "groups",
            Self::UsedGroup => "usedGroup",
            Self::SubGroups => "subGroups",
            Self::AuthenticatedWith => "authenticatedWith",
            Self::Idp => "idp",
            Self::Authentications => "authentications",
            Self::Mfa => "mfa",
            Self::UpstreamAcrs => "upstreamACRs",
            Self::UpstreamProtocol => "upstreamProtocol",
            Self::UpstreamIdp => "upstreamIdP",
        }
    }
}

/// Build the expression context for an output translation.
///
/// Without a login context the session keys are still defined: empty lists,
/// `mfa = false`, and `idp`/`upstreamIdP` set to null.
pub fn build_output_context(input: &TranslationInput) -> TranslationContext {
    use OutputContextKey as K;

    let mut vars = Map::new();
    let mut put = |key: OutputContextKey, value: Value| {
        vars.insert(key.as_str().to_string(), value);
    };

    put(K::Protocol, Value::String(input.protocol.clone()));
    put(K::ProtocolSubtype, Value::String(input.protocol_subtype.clone()));
    put(K::Requester, Value::String(input.requester.clone()));

    let (attr, attrs) = attribute_maps(
        input
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.values.as_slice())),
    );
    put(K::Attr, attr);
    put(K::Attrs, attrs);

    let (requester_attr, requester_attrs) = attribute_maps(
        input
            .requester_attributes
            .iter()
            .map(|a| (a.name.as_str(), a.values.as_slice())),
    );
    put(K::RequesterAttr, requester_attr);
    put(K::RequesterAttrs, requester_attrs);

    put(
        K::IdsByType,
        group_values(
            input
                .entity
                .identities
                .iter()
                .map(|i| (i.type_id.as_str(), i.value.as_str())),
        ),
    );
    put(
        K::ImportStatus,
        Value::Object(
            input
                .import_status
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
    );
    put(K::Groups, string_list(&input.groups));
    put(K::UsedGroup, Value::String(input.chosen_group.clone()));
    put(
        K::SubGroups,
        string_list(
            input
                .groups
                .iter()
                .filter(|g| is_child_group(g, &input.chosen_group)),
        ),
    );

    match &input.login {
        Some(login) => {
            put(K::AuthenticatedWith, string_list(&login.authenticated_with));
            put(
                K::Idp,
                Value::String(login.remote_idp.clone().unwrap_or_else(|| LOCAL_IDP.to_string())),
            );
            put(K::Authentications, string_list(&login.authenticators));
            put(K::Mfa, Value::Bool(login.authenticators.len() > 1));
            put(K::UpstreamAcrs, string_list(&login.upstream_acrs));
            put(
                K::UpstreamProtocol,
                Value::String(
                    login
                        .upstream_protocol
                        .clone()
                        .unwrap_or_else(|| DEFAULT_UPSTREAM_PROTOCOL.to_string()),
                ),
            );
            put(
                K::UpstreamIdp,
                login.upstream_idp.clone().map_or(Value::Null, Value::String),
            );
        }
        None => {
            put(K::AuthenticatedWith, Value::Array(Vec::new()));
            put(K::Idp, Value::Null);
            put(K::Authentications, Value::Array(Vec::new()));
            put(K::Mfa, Value::Bool(false));
            put(K::UpstreamAcrs, Value::Array(Vec::new()));
            put(
                K::UpstreamProtocol,
                Value::String(DEFAULT_UPSTREAM_PROTOCOL.to_string()),
            );
            put(K::UpstreamIdp, Value::Null);
        }
    }

    TranslationContext::new(vars)
}

/// Whether `group` lies strictly below `parent`.
fn is_child_group(group: &str, parent: &str) -> bool {
    if group == parent {
        return false;
    }
    if parent == "/" {
        return group.starts_with('/');
    }
    group
        .strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('/'))
}

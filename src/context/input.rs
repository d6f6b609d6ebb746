//! Context of input translation, built from a remote assertion.

use super::{TranslationContext, attribute_maps, group_values};
use crate::model::RemotelyAuthenticatedInput;
use serde_json::{Map, Value};

/// Variables available to input translation expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputContextKey {
    /// Name of the remote IdP
    Idp,
    /// Attribute name to its first value
    Attr,
    /// Attribute name to all of its values
    Attrs,
    /// Value of the first remote identity, or null
    Id,
    /// Type of the first remote identity, or null
    IdType,
    /// Identity type to all values of that type
    IdsByType,
    /// Names of the remote groups
    Groups,
}

impl InputContextKey {
    pub const ALL: [InputContextKey; 7] = [
        Self::Idp,
        Self::Attr,
        Self::Attrs,
        Self::Id,
        Self::IdType,
        Self::IdsByType,
        Self::Groups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idp => "idp",
            Self::Attr => "attr",
            Self::Attrs => "attrs",
            Self::Id => "id",
            Self::IdType => "idType",
            Self::IdsByType => "idsByType",
            Self::Groups => "groups",
        }
    }
}

/// Build the expression context for an input translation.
pub fn build_input_context(input: &RemotelyAuthenticatedInput) -> TranslationContext {
    let mut vars = Map::new();
    let mut put = |key: InputContextKey, value: Value| {
        vars.insert(key.as_str().to_string(), value);
    };

    put(InputContextKey::Idp, Value::String(input.idp.clone()));

    let (attr, attrs) = attribute_maps(
        input
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.values.as_slice())),
    );
    put(InputContextKey::Attr, attr);
    put(InputContextKey::Attrs, attrs);

    let first = input.identities.first();
    put(
        InputContextKey::Id,
        first.map_or(Value::Null, |i| Value::String(i.name.clone())),
    );
    put(
        InputContextKey::IdType,
        first.map_or(Value::Null, |i| Value::String(i.identity_type.clone())),
    );
    put(
        InputContextKey::IdsByType,
        group_values(
            input
                .identities
                .iter()
                .map(|i| (i.identity_type.as_str(), i.name.as_str())),
        ),
    );
    put(
        InputContextKey::Groups,
        Value::Array(
            input
                .groups
                .iter()
                .map(|g| Value::String(g.name.clone()))
                .collect(),
        ),
    );

    TranslationContext::new(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_context_keys() {
        let input = RemotelyAuthenticatedInput::new("idp1")
            .with_identity("userName", "joe")
            .with_identity("email", "joe@example.com")
            .with_identity("userName", "jdoe")
            .with_attribute("cn", ["Joe", "Joseph"])
            .with_group("staff");

        let context = build_input_context(&input);

        assert_eq!(context.get("idp"), Some(&json!("idp1")));
        assert_eq!(context.get("attr"), Some(&json!({"cn": "Joe"})));
        assert_eq!(context.get("attrs"), Some(&json!({"cn": ["Joe", "Joseph"]})));
        assert_eq!(context.get("id"), Some(&json!("joe")));
        assert_eq!(context.get("idType"), Some(&json!("userName")));
        assert_eq!(
            context.get("idsByType"),
            Some(&json!({"userName": ["joe", "jdoe"], "email": ["joe@example.com"]}))
        );
        assert_eq!(context.get("groups"), Some(&json!(["staff"])));
    }

    #[test]
    fn test_empty_input_defines_every_key() {
        let context = build_input_context(&RemotelyAuthenticatedInput::new("idp1"));

        for key in InputContextKey::ALL {
            assert!(context.contains(key.as_str()), "missing {}", key.as_str());
        }
        assert_eq!(context.get("attr"), Some(&json!({})));
        assert_eq!(context.get("idsByType"), Some(&json!({})));
        assert_eq!(context.get("groups"), Some(&json!([])));
        assert_eq!(context.get("id"), Some(&Value::Null));
    }

    #[test]
    fn test_attribute_without_values_maps_to_empty_string() {
        let input = RemotelyAuthenticatedInput::new("idp1").with_attribute("flag", Vec::<String>::new());
        let context = build_input_context(&input);
        assert_eq!(context.get("attr"), Some(&json!({"flag": ""})));
        assert_eq!(context.get("attrs"), Some(&json!({"flag": []})));
    }
}

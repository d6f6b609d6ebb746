//! Test data builders for profile documents and translation inputs.

use identity_translation::model::{
    Attribute, EntityId, EntitySnapshot, IdentityParam, RemotelyAuthenticatedInput,
    TranslationInput,
};
use serde_json::{Value, json};

/// Builder for profile JSON documents in the current format.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    name: String,
    description: String,
    direction: &'static str,
    mode: Option<String>,
    rules: Vec<Value>,
}

impl ProfileBuilder {
    pub fn input(name: &str) -> Self {
        Self::new(name, "INPUT")
    }

    pub fn output(name: &str) -> Self {
        Self::new(name, "OUTPUT")
    }

    fn new(name: &str, direction: &'static str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            direction,
            mode: None,
            rules: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    /// Append a rule guarded by `condition`.
    pub fn rule(mut self, condition: &str, action: &str, parameters: &[&str]) -> Self {
        self.rules.push(json!({
            "condition": {"conditionValue": condition},
            "action": {"name": action, "parameters": parameters}
        }));
        self
    }

    /// Append an unconditional rule.
    pub fn always(self, action: &str, parameters: &[&str]) -> Self {
        self.rule("true", action, parameters)
    }

    pub fn build(self) -> Value {
        let mut document = json!({
            "ver": "2",
            "name": self.name,
            "description": self.description,
            "direction": self.direction,
            "rules": self.rules,
        });
        if let Some(mode) = self.mode {
            document["mode"] = Value::String(mode);
        }
        document
    }
}

/// Remote input carrying an identity and, when given, an email attribute.
pub fn remote_input(user: &str, email: Option<&str>) -> RemotelyAuthenticatedInput {
    let input = RemotelyAuthenticatedInput::new("https://idp.example.org")
        .with_identity("userName", user)
        .with_group("staff");
    match email {
        Some(email) => input.with_attribute("email", [email]),
        None => input,
    }
}

/// Local entity snapshot released to `sp.example.org` over SAML.
pub fn local_input(entity: EntityId) -> TranslationInput {
    TranslationInput::new(
        EntitySnapshot::new(entity)
            .with_identity(IdentityParam::new("userName", "joe"))
            .with_identity(IdentityParam::new("email", "joe@example.com")),
        "SAML2",
        "https://sp.example.org",
    )
    .with_attribute(Attribute::new("cn", "/", ["Joe Doe"]))
    .with_attribute(Attribute::new("mail", "/", ["joe@example.com"]))
    .with_group("/staff")
}

//! Variable contexts consumed by conditions and actions.
//!
//! A [`TranslationContext`] is built once per `translate()` call from the
//! translation input and is read-only afterwards. Every documented key is
//! always present: missing collections become empty maps or lists and a
//! missing scalar becomes `null`, so conditions can reference any key
//! unconditionally.

mod input;
mod output;

pub use input::{InputContextKey, build_input_context};
pub use output::{OutputContextKey, build_output_context};

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Immutable snapshot of the variables visible to expressions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationContext {
    variables: Map<String, Value>,
}

impl TranslationContext {
    /// Build a context from a ready variable map.
    pub fn new(variables: Map<String, Value>) -> Self {
        Self { variables }
    }

    /// Build a context from a JSON object. Non-object values produce an
    /// empty context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(variables) => Self { variables },
            _ => Self::default(),
        }
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Check whether a variable is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Names of all defined variables.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// The whole context as a JSON object, useful for trace dumps.
    pub fn to_value(&self) -> Value {
        Value::Object(self.variables.clone())
    }
}

/// Group `(key, value)` pairs into a map of lists, keeping value order.
pub(crate) fn group_values<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Value {
    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for (key, value) in pairs {
        grouped
            .entry(key)
            .or_default()
            .push(Value::String(value.to_string()));
    }
    Value::Object(
        grouped
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::Array(v)))
            .collect(),
    )
}

/// The `attr`/`attrs` pair for a set of named multi-valued attributes:
/// first value (or empty string) and all values.
pub(crate) fn attribute_maps<'a>(
    attributes: impl IntoIterator<Item = (&'a str, &'a [String])>,
) -> (Value, Value) {
    let mut first = Map::new();
    let mut all = Map::new();
    for (name, values) in attributes {
        first.insert(
            name.to_string(),
            Value::String(values.first().cloned().unwrap_or_default()),
        );
        all.insert(
            name.to_string(),
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
    }
    (Value::Object(first), Value::Object(all))
}

pub(crate) fn string_list<'a>(items: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(items.into_iter().cloned().map(Value::String).collect())
}

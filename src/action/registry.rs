//! Name to factory lookup for translation actions.

use super::{ActionDefinition, ActionFactory, TranslationAction};
use crate::error::RegistryError;
use crate::profile::ProfileDirection;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of action factories keyed by action name.
///
/// Populated once at startup and read-only afterwards; resolution is a plain
/// map lookup, so a shared registry needs no locking.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    factories: HashMap<String, Arc<dyn ActionFactory>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in action.
    pub fn with_builtin_actions() -> Self {
        let mut registry = Self::new();
        for (name, factory) in crate::actions::builtin_factories() {
            registry.factories.insert(name.to_string(), factory);
        }
        registry
    }

    /// Register a factory under `type_name`.
    pub fn register_factory(
        &mut self,
        type_name: impl Into<String>,
        factory: Arc<dyn ActionFactory>,
    ) -> Result<(), RegistryError> {
        let type_name = type_name.into();
        if self.factories.contains_key(&type_name) {
            return Err(RegistryError::DuplicateAction(type_name));
        }
        log::debug!(
            "Registered {} translation action '{}'",
            factory.direction(),
            type_name
        );
        self.factories.insert(type_name, factory);
        Ok(())
    }

    /// Look up the factory registered under `type_name`.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<dyn ActionFactory>, RegistryError> {
        self.factories
            .get(type_name)
            .cloned()
            .ok_or_else(|| RegistryError::ActionNotFound(type_name.to_string()))
    }

    /// Resolve the factory and create the action, validating its parameters
    /// against the declared signature first.
    pub fn create(&self, definition: ActionDefinition) -> Result<TranslationAction, RegistryError> {
        let factory = self.resolve(&definition.name)?;
        factory.validate(&definition)?;
        factory.create(definition)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered action names of one direction, sorted.
    pub fn names_for(&self, direction: ProfileDirection) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .factories
            .iter()
            .filter(|(_, f)| f.direction() == direction)
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

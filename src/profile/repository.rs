//! Named profiles of both directions, loaded from JSON documents or a
//! directory of `*.json` files.

use super::{
    InputTranslationProfile, OutputTranslationProfile, ProfileDefinition, ProfileDirection,
    ProfileResolver,
};
use crate::action::ActionRegistry;
use crate::error::ProfileError;
use crate::expression::ExpressionEvaluator;
use log::info;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-memory set of profiles, keyed by direction and name.
///
/// Implements [`ProfileResolver`] so profiles can include each other.
#[derive(Debug, Clone, Default)]
pub struct ProfileRepository {
    input: HashMap<String, Arc<InputTranslationProfile>>,
    output: HashMap<String, Arc<OutputTranslationProfile>>,
}

impl ProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file of `dir`, in file name order.
    pub fn from_profile_dir<P: AsRef<Path>>(
        dir: P,
        registry: &ActionRegistry,
    ) -> Result<Self, ProfileError> {
        let mut repository = Self::new();
        for path in profile_files(dir.as_ref())? {
            let definition = read_definition(&path)?;
            repository.add_definition(&definition, registry)?;
        }
        info!(
            "Loaded {} input and {} output translation profiles from {}",
            repository.input.len(),
            repository.output.len(),
            dir.as_ref().display()
        );
        Ok(repository)
    }

    /// Add a profile document. Returns the direction it was added under.
    pub fn add_json(&mut self, json: &Value, registry: &ActionRegistry) -> Result<ProfileDirection, ProfileError> {
        let definition = ProfileDefinition::from_json(json)?;
        self.add_definition(&definition, registry)
    }

    /// Add a profile under its declared direction or, when it declares none,
    /// the direction of its actions.
    pub fn add_definition(
        &mut self,
        definition: &ProfileDefinition,
        registry: &ActionRegistry,
    ) -> Result<ProfileDirection, ProfileError> {
        let direction = definition.resolve_direction(registry);
        match direction {
            ProfileDirection::Input => {
                self.add_input(InputTranslationProfile::from_definition(definition, registry)?)?
            }
            ProfileDirection::Output => {
                self.add_output(OutputTranslationProfile::from_definition(definition, registry)?)?
            }
        }
        Ok(direction)
    }

    pub fn add_input(&mut self, profile: InputTranslationProfile) -> Result<(), ProfileError> {
        if self.input.contains_key(profile.name()) {
            return Err(ProfileError::DuplicateProfile {
                profile: profile.name().to_string(),
                direction: ProfileDirection::Input,
            });
        }
        self.input.insert(profile.name().to_string(), Arc::new(profile));
        Ok(())
    }

    pub fn add_output(&mut self, profile: OutputTranslationProfile) -> Result<(), ProfileError> {
        if self.output.contains_key(profile.name()) {
            return Err(ProfileError::DuplicateProfile {
                profile: profile.name().to_string(),
                direction: ProfileDirection::Output,
            });
        }
        self.output.insert(profile.name().to_string(), Arc::new(profile));
        Ok(())
    }

    /// Swap the expression evaluator of every loaded profile.
    pub fn set_evaluator(&mut self, evaluator: Arc<dyn ExpressionEvaluator>) {
        for profile in self.input.values_mut() {
            *profile = Arc::new((**profile).clone().with_evaluator(Arc::clone(&evaluator)));
        }
        for profile in self.output.values_mut() {
            *profile = Arc::new((**profile).clone().with_evaluator(Arc::clone(&evaluator)));
        }
    }

    /// Names of the profiles of one direction, sorted.
    pub fn names(&self, direction: ProfileDirection) -> Vec<&str> {
        let mut names: Vec<&str> = match direction {
            ProfileDirection::Input => self.input.keys().map(String::as_str).collect(),
            ProfileDirection::Output => self.output.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.input.len() + self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }
}

impl ProfileResolver for ProfileRepository {
    fn input_profile(&self, name: &str) -> Option<Arc<InputTranslationProfile>> {
        self.input.get(name).cloned()
    }

    fn output_profile(&self, name: &str) -> Option<Arc<OutputTranslationProfile>> {
        self.output.get(name).cloned()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ProfileError {
    ProfileError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// `*.json` files of a directory, sorted by file name.
pub(crate) fn profile_files(dir: &Path) -> Result<Vec<PathBuf>, ProfileError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn read_definition(path: &Path) -> Result<ProfileDefinition, ProfileError> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    ProfileDefinition::from_json_str(&content)
}

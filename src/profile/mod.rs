//! Translation profiles: ordered rules plus metadata, with their JSON form.
//!
//! A profile is immutable once loaded and can be shared between threads;
//! every `translate()` call builds its own context and result.
//!
//! ## JSON format
//!
//! ```json
//! {
//!   "ver": "2",
//!   "name": "ldap-in",
//!   "description": "Maps LDAP users",
//!   "direction": "INPUT",
//!   "mode": "UPDATE_ONLY",
//!   "rules": [
//!     {"condition": {"conditionValue": "attr['email'] != null"},
//!      "action": {"name": "mapAttribute", "parameters": ["mail", "/", "attr['email']"]}}
//!   ]
//! }
//! ```
//!
//! `ver` and `direction` are optional. Without `direction` the profile takes
//! the direction it is loaded as. Documents without `ver` that use the legacy
//! gate rules or legacy-only actions are converted from the legacy format.

mod input;
mod legacy;
mod output;
mod repository;


pub use input::InputTranslationProfile;
pub use output::OutputTranslationProfile;
pub use repository::ProfileRepository;
pub(crate) use repository::{profile_files, read_definition};

use crate::action::{
    ActionDefinition, ActionDescriptor, ActionFactory, ActionRegistry, TranslationAction,
};
use crate::error::ProfileError;
use crate::rule::{TranslationCondition, TranslationRule};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Format version written by [`to_json`](InputTranslationProfile::to_json).
pub const PROFILE_FORMAT_VERSION: &str = "2";

/// Which way a profile translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileDirection {
    /// Remote assertion to local identity model
    #[default]
    Input,
    /// Local data to what a relying party receives
    Output,
}

impl ProfileDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::Output => "OUTPUT",
        }
    }
}

impl fmt::Display for ProfileDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Reconciliation policy of an input profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileMode {
    /// Add and update, never remove
    #[default]
    UpdateOnly,
    /// Also remove data previously imported by the profile but no longer mapped
    UpdateAndRemoveMissing,
}

impl fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdateOnly => write!(f, "UPDATE_ONLY"),
            Self::UpdateAndRemoveMissing => write!(f, "UPDATE_AND_REMOVE_MISSING"),
        }
    }
}

/// Serialized rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub condition: TranslationCondition,
    pub action: ActionDefinition,
}

/// Serialized profile, independent of the action registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ProfileDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ProfileMode>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl ProfileDefinition {
    /// Read a profile document, converting it when it is in the legacy
    /// format.
    pub fn from_json(value: &Value) -> Result<Self, ProfileError> {
        match value.get("ver") {
            None if legacy::is_legacy(value) => legacy::convert(value),
            None => Ok(serde_json::from_value(value.clone())?),
            Some(Value::String(ver)) if ver == PROFILE_FORMAT_VERSION => {
                Ok(serde_json::from_value(value.clone())?)
            }
            Some(other) => Err(ProfileError::UnsupportedVersion(match other {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            })),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        Self::from_json(&serde_json::from_str(json)?)
    }

    /// Whether `value` is an unversioned document using legacy constructs.
    pub fn is_legacy(value: &Value) -> bool {
        value.get("ver").is_none() && legacy::is_legacy(value)
    }

    /// The declared direction, else the direction of the first registered
    /// action, else input.
    pub fn resolve_direction(&self, registry: &ActionRegistry) -> ProfileDirection {
        self.direction
            .or_else(|| {
                self.rules
                    .iter()
                    .find_map(|rule| registry.resolve(&rule.action.name).ok())
                    .map(|factory| factory.direction())
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Value {
        // Serializing plain strings and enums into a Value cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Looks up profiles by name for `include*Profile` actions.
pub trait ProfileResolver: Send + Sync {
    fn input_profile(&self, name: &str) -> Option<Arc<InputTranslationProfile>>;

    fn output_profile(&self, name: &str) -> Option<Arc<OutputTranslationProfile>>;
}

/// Resolver that knows no profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfiles;

impl ProfileResolver for NoProfiles {
    fn input_profile(&self, _name: &str) -> Option<Arc<InputTranslationProfile>> {
        None
    }

    fn output_profile(&self, _name: &str) -> Option<Arc<OutputTranslationProfile>> {
        None
    }
}

/// Instantiate the rules of `definition` through the registry, keeping only
/// actions of the `expected` direction. A definition without a direction
/// takes `expected`.
fn instantiate_rules<A: ?Sized>(
    definition: &ProfileDefinition,
    registry: &ActionRegistry,
    expected: ProfileDirection,
    select: impl Fn(TranslationAction) -> Option<Arc<A>>,
) -> Result<Vec<TranslationRule<A>>, ProfileError> {
    if let Some(actual) = definition.direction.filter(|d| *d != expected) {
        return Err(ProfileError::DirectionMismatch {
            profile: definition.name.clone(),
            expected,
            actual,
        });
    }
    let mut rules = Vec::with_capacity(definition.rules.len());
    for (position, rule) in definition.rules.iter().enumerate() {
        let rule_index = position + 1;
        let action = registry
            .create(rule.action.clone())
            .map_err(|source| ProfileError::Action {
                profile: definition.name.clone(),
                rule_index,
                source,
            })?;
        let actual = action.direction();
        let action = select(action).ok_or_else(|| ProfileError::ActionDirectionMismatch {
            profile: definition.name.clone(),
            rule_index,
            action: rule.action.name.clone(),
            expected,
            actual,
        })?;
        rules.push(TranslationRule::new(rule.condition.clone(), action));
    }
    Ok(rules)
}

fn rule_definitions<A: ActionDescriptor + ?Sized>(rules: &[TranslationRule<A>]) -> Vec<RuleDefinition> {
    rules
        .iter()
        .map(|rule| RuleDefinition {
            condition: rule.condition().clone(),
            action: rule.action().definition().clone(),
        })
        .collect()
}

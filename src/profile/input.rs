//! Input translation profile.

use super::{
    NoProfiles, PROFILE_FORMAT_VERSION, ProfileDefinition, ProfileDirection, ProfileMode,
    ProfileResolver, instantiate_rules, rule_definitions,
};
use crate::action::{ActionRegistry, InputTranslationAction, TranslationAction};
use crate::context::{TranslationContext, build_input_context};
use crate::error::{ProfileError, TranslationError};
use crate::expression::{ExpressionEvaluator, StandardEvaluator};
use crate::model::RemotelyAuthenticatedInput;
use crate::result::MappingResult;
use crate::rule::{RuleScope, TranslationRule, run_rules};
use log::{debug, info, trace};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Rule of an input profile.
pub type InputTranslationRule = TranslationRule<dyn InputTranslationAction>;

/// Maps what a remote IdP asserted onto the local identity model.
///
/// # Examples
///
/// ```rust
/// use identity_translation::action::ActionRegistry;
/// use identity_translation::model::RemotelyAuthenticatedInput;
/// use identity_translation::profile::InputTranslationProfile;
/// use serde_json::json;
///
/// let registry = ActionRegistry::with_builtin_actions();
/// let profile = InputTranslationProfile::from_json(
///     &json!({
///         "ver": "2",
///         "name": "mail",
///         "rules": [{
///             "condition": {"conditionValue": "attr['email'] != null"},
///             "action": {"name": "mapAttribute", "parameters": ["mail", "/", "attr['email']"]}
///         }]
///     }),
///     &registry,
/// )
/// .unwrap();
///
/// let input = RemotelyAuthenticatedInput::new("idp").with_attribute("email", ["a@b.org"]);
/// let result = profile.translate(&input).unwrap();
/// assert_eq!(result.attributes[0].attribute.values, vec!["a@b.org"]);
/// ```
#[derive(Debug, Clone)]
pub struct InputTranslationProfile {
    name: String,
    description: String,
    mode: ProfileMode,
    rules: Vec<InputTranslationRule>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl InputTranslationProfile {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        mode: ProfileMode,
        rules: Vec<InputTranslationRule>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            mode,
            rules,
            evaluator: Arc::new(StandardEvaluator::new()),
        }
    }

    /// Replace the expression evaluator used for conditions and parameters.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn mode(&self) -> ProfileMode {
        self.mode
    }

    pub fn rules(&self) -> &[InputTranslationRule] {
        &self.rules
    }

    /// Run the profile without access to other profiles.
    pub fn translate(
        &self,
        input: &RemotelyAuthenticatedInput,
    ) -> Result<MappingResult, TranslationError> {
        self.translate_with(input, &NoProfiles)
    }

    /// Run the profile, resolving included profiles through `resolver`.
    pub fn translate_with(
        &self,
        input: &RemotelyAuthenticatedInput,
        resolver: &dyn ProfileResolver,
    ) -> Result<MappingResult, TranslationError> {
        let translation_id = Uuid::new_v4();
        trace!(
            "Translation {} input profile '{}' received:\n{}",
            translation_id,
            self.name,
            input.text_dump()
        );
        let context = build_input_context(input);
        trace!(
            "Translation {} context: {}",
            translation_id,
            context.to_value()
        );

        let result = self.execute(input, &context, resolver, &[], translation_id)?;
        debug!(
            "Translation {} input profile '{}' mapped {} identities, {} attributes, {} groups",
            translation_id,
            self.name,
            result.identities.len(),
            result.attributes.len(),
            result.groups.len()
        );
        Ok(result)
    }

    /// Run the rules against a prepared context, merging every action result.
    pub(crate) fn execute(
        &self,
        input: &RemotelyAuthenticatedInput,
        variables: &TranslationContext,
        resolver: &dyn ProfileResolver,
        include_chain: &[String],
        translation_id: Uuid,
    ) -> Result<MappingResult, TranslationError> {
        let mut chain = include_chain.to_vec();
        chain.push(self.name.clone());
        let scope = RuleScope {
            profile: &self.name,
            translation_id,
            variables,
            evaluator: self.evaluator.as_ref(),
            resolver,
            include_chain: &chain,
        };

        let mut result = MappingResult::new();
        run_rules(&self.rules, &scope, |action, invocation| {
            let outcome = action.invoke(input, invocation)?;
            result.merge_with(outcome.result);
            Ok(outcome.flow)
        })?;
        Ok(result)
    }

    /// Build a profile from its definition, resolving every action.
    pub fn from_definition(
        definition: &ProfileDefinition,
        registry: &ActionRegistry,
    ) -> Result<Self, ProfileError> {
        let rules = instantiate_rules(definition, registry, ProfileDirection::Input, |action| {
            match action {
                TranslationAction::Input(action) => Some(action),
                TranslationAction::Output(_) => None,
            }
        })?;
        info!(
            "Loaded input translation profile '{}' with {} rules",
            definition.name,
            rules.len()
        );
        Ok(Self::new(
            definition.name.clone(),
            definition.description.clone(),
            definition.mode.unwrap_or_default(),
            rules,
        ))
    }

    pub fn from_json(json: &Value, registry: &ActionRegistry) -> Result<Self, ProfileError> {
        Self::from_definition(&ProfileDefinition::from_json(json)?, registry)
    }

    pub fn from_json_str(json: &str, registry: &ActionRegistry) -> Result<Self, ProfileError> {
        Self::from_definition(&ProfileDefinition::from_json_str(json)?, registry)
    }

    pub fn to_definition(&self) -> ProfileDefinition {
        ProfileDefinition {
            ver: Some(PROFILE_FORMAT_VERSION.to_string()),
            name: self.name.clone(),
            description: self.description.clone(),
            direction: Some(ProfileDirection::Input),
            mode: Some(self.mode),
            rules: rule_definitions(&self.rules),
        }
    }

    pub fn to_json(&self) -> Value {
        self.to_definition().to_json()
    }

    pub fn to_json_string(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(&self.to_definition())?)
    }
}

impl PartialEq for InputTranslationProfile {
    fn eq(&self, other: &Self) -> bool {
        self.to_definition() == other.to_definition()
    }
}

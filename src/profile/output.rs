//! Output translation profile.

use super::{
    NoProfiles, PROFILE_FORMAT_VERSION, ProfileDefinition, ProfileDirection, ProfileResolver,
    instantiate_rules, rule_definitions,
};
use crate::action::{ActionRegistry, OutputTranslationAction, TranslationAction};
use crate::context::{TranslationContext, build_output_context};
use crate::error::{ProfileError, TranslationError};
use crate::expression::{ExpressionEvaluator, StandardEvaluator};
use crate::model::TranslationInput;
use crate::result::TranslationResult;
use crate::rule::{RuleScope, TranslationRule, run_rules};
use log::{debug, info, trace, warn};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Rule of an output profile.
pub type OutputTranslationRule = TranslationRule<dyn OutputTranslationAction>;

/// Shapes the local data released to a relying party.
#[derive(Debug, Clone)]
pub struct OutputTranslationProfile {
    name: String,
    description: String,
    rules: Vec<OutputTranslationRule>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl OutputTranslationProfile {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        rules: Vec<OutputTranslationRule>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            rules,
            evaluator: Arc::new(StandardEvaluator::new()),
        }
    }

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

    pub fn rules(&self) -> &[OutputTranslationRule] {
        &self.rules
    }

    /// Run the profile starting from an empty result.
    pub fn translate(&self, input: &TranslationInput) -> Result<TranslationResult, TranslationError> {
        self.translate_with(input, &NoProfiles)
    }

    pub fn translate_with(
        &self,
        input: &TranslationInput,
        resolver: &dyn ProfileResolver,
    ) -> Result<TranslationResult, TranslationError> {
        self.translate_with_state(input, resolver, TranslationResult::new())
    }

    /// Run the profile on top of a partially built result.
    pub fn translate_with_state(
        &self,
        input: &TranslationInput,
        resolver: &dyn ProfileResolver,
        initial: TranslationResult,
    ) -> Result<TranslationResult, TranslationError> {
        let translation_id = Uuid::new_v4();
        trace!(
            "Translation {} output profile '{}' received:\n{}",
            translation_id,
            self.name,
            input.text_dump()
        );
        let context = build_output_context(input);
        trace!(
            "Translation {} context: {}",
            translation_id,
            context.to_value()
        );

        let mut result = initial;
        self.execute(input, &context, resolver, &[], translation_id, &mut result)?;
        debug!(
            "Translation {} output profile '{}' exposes {} attributes and {} identities",
            translation_id,
            self.name,
            result.attributes().len(),
            result.identities().len()
        );
        Ok(result)
    }

    /// Run the rules against a prepared context and a shared result.
    pub(crate) fn execute(
        &self,
        input: &TranslationInput,
        variables: &TranslationContext,
        resolver: &dyn ProfileResolver,
        include_chain: &[String],
        translation_id: Uuid,
        result: &mut TranslationResult,
    ) -> Result<(), TranslationError> {
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
        run_rules(&self.rules, &scope, |action, invocation| {
            action.invoke(input, invocation, result)
        })?;
        Ok(())
    }

    pub fn from_definition(
        definition: &ProfileDefinition,
        registry: &ActionRegistry,
    ) -> Result<Self, ProfileError> {
        if let Some(mode) = definition.mode {
            warn!(
                "Output translation profile '{}' declares mode {}, which only applies to input profiles; ignored",
                definition.name, mode
            );
        }
        let rules = instantiate_rules(definition, registry, ProfileDirection::Output, |action| {
            match action {
                TranslationAction::Output(action) => Some(action),
                TranslationAction::Input(_) => None,
            }
        })?;
        info!(
            "Loaded output translation profile '{}' with {} rules",
            definition.name,
            rules.len()
        );
        Ok(Self::new(
            definition.name.clone(),
            definition.description.clone(),
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
            direction: Some(ProfileDirection::Output),
            mode: None,
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

impl PartialEq for OutputTranslationProfile {
    fn eq(&self, other: &Self) -> bool {
        self.to_definition() == other.to_definition()
    }
}

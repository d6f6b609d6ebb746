//! Engine facade tying the action registry, the expression evaluator and
//! the configured profiles together.
//!
//! # Example
//!
//! ```rust
//! use identity_translation::engine::TranslationEngineBuilder;
//! use identity_translation::model::RemotelyAuthenticatedInput;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = TranslationEngineBuilder::new()
//!     .with_profile_json(json!({
//!         "ver": "2",
//!         "name": "sso",
//!         "rules": [{
//!             "condition": {"conditionValue": "true"},
//!             "action": {"name": "mapIdentity", "parameters": ["userName", "id"]}
//!         }]
//!     }))
//!     .build()?;
//!
//! let input = RemotelyAuthenticatedInput::new("idp").with_identity("userName", "joe");
//! let result = engine.translate_input("sso", &input)?;
//! assert_eq!(result.identities[0].identity.value, "joe");
//! # Ok(())
//! # }
//! ```

use crate::action::ActionRegistry;
use crate::apply::{
    ApplySummary, AttributeStore, IdentityStore, MappingReconciler, ReconcileOutcome,
    ReconcileRequest, apply_translation_result,
};
use crate::error::{EngineError, EngineResult, ProfileError};
use crate::expression::ExpressionEvaluator;
use crate::model::{EntityId, RemotelyAuthenticatedInput, TranslationInput};
use crate::profile::{
    InputTranslationProfile, OutputTranslationProfile, ProfileDirection, ProfileRepository,
    ProfileResolver, profile_files, read_definition,
};
use crate::result::{MappingResult, TranslationResult};
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Runs configured translation profiles.
///
/// Immutable once built; share it across tasks behind an `Arc` or clone it
/// (clones share the registry and profiles).
#[derive(Debug, Clone)]
pub struct TranslationEngine {
    registry: Arc<ActionRegistry>,
    profiles: Arc<ProfileRepository>,
    seed_output: bool,
}

impl TranslationEngine {
    pub fn builder() -> TranslationEngineBuilder {
        TranslationEngineBuilder::new()
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn profiles(&self) -> &ProfileRepository {
        &self.profiles
    }

    pub fn input_profile(&self, name: &str) -> EngineResult<Arc<InputTranslationProfile>> {
        self.profiles
            .input_profile(name)
            .ok_or_else(|| EngineError::ProfileNotFound {
                profile: name.to_string(),
                direction: ProfileDirection::Input,
            })
    }

    pub fn output_profile(&self, name: &str) -> EngineResult<Arc<OutputTranslationProfile>> {
        self.profiles
            .output_profile(name)
            .ok_or_else(|| EngineError::ProfileNotFound {
                profile: name.to_string(),
                direction: ProfileDirection::Output,
            })
    }

    /// Run an input profile.
    pub fn translate_input(
        &self,
        profile: &str,
        input: &RemotelyAuthenticatedInput,
    ) -> EngineResult<MappingResult> {
        let profile = self.input_profile(profile)?;
        Ok(profile.translate_with(input, self.profiles.as_ref())?)
    }

    /// Run an input profile and merge its mapping through `reconciler`,
    /// passing the profile's mode along.
    pub async fn process_input<R>(
        &self,
        profile: &str,
        input: &RemotelyAuthenticatedInput,
        reconciler: &R,
    ) -> EngineResult<ReconcileOutcome>
    where
        R: MappingReconciler,
    {
        let profile = self.input_profile(profile)?;
        let result = profile.translate_with(input, self.profiles.as_ref())?;
        let request = ReconcileRequest {
            result: &result,
            idp: &input.idp,
            profile: profile.name(),
            mode: profile.mode(),
        };
        let outcome = reconciler
            .reconcile(request)
            .await
            .map_err(|e| EngineError::Reconcile(Box::new(e)))?;
        debug!(
            "Input profile '{}' from {} reconciled as {:?}",
            profile.name(),
            input.idp,
            outcome
        );
        Ok(outcome)
    }

    /// Run an output profile. The result starts empty unless the engine was
    /// built with output seeding.
    pub fn translate_output(
        &self,
        profile: &str,
        input: &TranslationInput,
    ) -> EngineResult<TranslationResult> {
        let profile = self.output_profile(profile)?;
        let initial = if self.seed_output {
            TranslationResult::from_input(input)
        } else {
            TranslationResult::new()
        };
        Ok(profile.translate_with_state(input, self.profiles.as_ref(), initial)?)
    }

    /// Run an output profile, then persist what it marked for persistence
    /// under `entity`. Nothing is applied when the translation fails.
    pub async fn process_output<I, A>(
        &self,
        profile: &str,
        input: &TranslationInput,
        entity: EntityId,
        identity_store: &I,
        attribute_store: &A,
    ) -> EngineResult<(TranslationResult, ApplySummary)>
    where
        I: IdentityStore,
        A: AttributeStore,
    {
        let result = self.translate_output(profile, input)?;
        let summary = apply_translation_result(entity, &result, identity_store, attribute_store).await?;
        Ok((result, summary))
    }
}

/// Configures a [`TranslationEngine`].
///
/// Profiles are loaded at [`build`](Self::build) time in this order: profile
/// directories, JSON documents, then ready-made profiles. A name clash within
/// one direction fails the build.
#[derive(Debug, Default)]
pub struct TranslationEngineBuilder {
    registry: Option<ActionRegistry>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    profile_dirs: Vec<PathBuf>,
    documents: Vec<Value>,
    input_profiles: Vec<InputTranslationProfile>,
    output_profiles: Vec<OutputTranslationProfile>,
    seed_output: bool,
}

impl TranslationEngineBuilder {
    /// Builder with the built-in actions and the standard evaluator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom action registry instead of the built-in one.
    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Evaluate conditions and parameters of every profile with `evaluator`.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Load every `*.json` profile of a directory.
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dirs.push(dir.into());
        self
    }

    /// Add a profile JSON document; its `direction` selects the kind.
    pub fn with_profile_json(mut self, json: Value) -> Self {
        self.documents.push(json);
        self
    }

    pub fn with_input_profile(mut self, profile: InputTranslationProfile) -> Self {
        self.input_profiles.push(profile);
        self
    }

    pub fn with_output_profile(mut self, profile: OutputTranslationProfile) -> Self {
        self.output_profiles.push(profile);
        self
    }

    /// Start output translations from the entity's own identities and
    /// attributes instead of an empty result.
    pub fn with_output_seeding(mut self, seed: bool) -> Self {
        self.seed_output = seed;
        self
    }

    pub fn build(self) -> Result<TranslationEngine, ProfileError> {
        let registry = self
            .registry
            .unwrap_or_else(ActionRegistry::with_builtin_actions);

        let mut profiles = ProfileRepository::new();
        for dir in &self.profile_dirs {
            for path in profile_files(dir)? {
                let definition = read_definition(&path)?;
                profiles.add_definition(&definition, &registry)?;
            }
        }
        for json in &self.documents {
            profiles.add_json(json, &registry)?;
        }
        for profile in self.input_profiles {
            profiles.add_input(profile)?;
        }
        for profile in self.output_profiles {
            profiles.add_output(profile)?;
        }
        if let Some(evaluator) = self.evaluator {
            profiles.set_evaluator(evaluator);
        }

        info!(
            "Translation engine ready with {} actions, {} input and {} output profiles",
            registry.len(),
            profiles.names(ProfileDirection::Input).len(),
            profiles.names(ProfileDirection::Output).len()
        );
        Ok(TranslationEngine {
            registry: Arc::new(registry),
            profiles: Arc::new(profiles),
            seed_output: self.seed_output,
        })
    }
}

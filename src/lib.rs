//! Rule-driven identity translation for Rust.
//!
//! Translates what a remote identity provider asserted into local
//! identities, attributes and group memberships (input direction), and
//! shapes the local data released to a relying party (output direction).
//! Both directions run ordered, condition-guarded rules collected into
//! profiles that round-trip through JSON.
//!
//! # Core Components
//!
//! - [`InputTranslationProfile`] / [`OutputTranslationProfile`] - ordered rules plus metadata
//! - [`ActionRegistry`] - named action factories, built-ins included
//! - [`ExpressionEvaluator`] - pluggable condition and parameter language
//! - [`TranslationEngine`] - facade running configured profiles and persisting their results
//!
//! # Quick Start
//!
//! ```rust
//! use identity_translation::{ActionRegistry, InputTranslationProfile, RemotelyAuthenticatedInput};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ActionRegistry::with_builtin_actions();
//! let profile = InputTranslationProfile::from_json(
//!     &json!({
//!         "ver": "2",
//!         "name": "mail",
//!         "rules": [{
//!             "condition": {"conditionValue": "attr['email'] != null"},
//!             "action": {"name": "mapAttribute", "parameters": ["mail", "/", "attr['email']"]}
//!         }]
//!     }),
//!     &registry,
//! )?;
//!
//! let input = RemotelyAuthenticatedInput::new("https://idp.example.org")
//!     .with_attribute("email", ["a@b.org"]);
//! let result = profile.translate(&input)?;
//! assert_eq!(result.attributes.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod actions;
pub mod apply;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod model;
pub mod profile;
pub mod result;
pub mod rule;

// Re-export commonly used types for convenience
pub use action::{ActionDefinition, ActionFactory, ActionRegistry, ExecutionFlow};
pub use apply::{
    AttributeStore, IdentityStore, InMemoryEntityStore, MappingReconciler, ReconcileOutcome,
    ReconcileRequest, apply_translation_result,
};
pub use engine::{TranslationEngine, TranslationEngineBuilder};
pub use error::{
    ActionError, ApplyError, EngineError, EngineResult, EvaluationError, ProfileError,
    RegistryError, TranslationError,
};
pub use expression::{ExpressionEvaluator, StandardEvaluator};
pub use model::{Attribute, EntityId, IdentityParam, RemotelyAuthenticatedInput, TranslationInput};
pub use profile::{
    InputTranslationProfile, OutputTranslationProfile, ProfileDirection, ProfileMode,
    ProfileRepository,
};
pub use result::{MappingResult, TranslationResult};

//! Result accumulators written by translation actions.
//!
//! Input actions each return a fresh [`MappingResult`] that the profile
//! merges into its running result. Output actions mutate one shared
//! [`TranslationResult`] in place and may retract what earlier rules added.

mod mapping;
mod translation;


pub use mapping::{
    AttributeEffectMode, EntityChange, EntityScheduledOperation, GroupEffectMode,
    IdentityEffectMode, MappedAttribute, MappedGroup, MappedIdentity, MappingResult,
    UnknownConstant,
};
pub use translation::{DynamicAttribute, ResultScope, TranslationResult};

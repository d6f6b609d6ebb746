//! Persisting what a translation produced.
//!
//! Output direction: [`apply_translation_result`] writes the identities and
//! attributes a [`TranslationResult`] marked for persistence through an
//! [`IdentityStore`] and an [`AttributeStore`]. Identities go first, then
//! attributes. The first failure aborts the remaining writes and nothing
//! already written is rolled back.
//!
//! Input direction: a [`MappingReconciler`] merges a [`MappingResult`] into
//! the local identity database, honouring the profile's [`ProfileMode`].
//!
//! [`InMemoryEntityStore`] implements all three collaborator traits.

mod in_memory;

#[cfg(test)]
mod tests;

pub use in_memory::{GroupMembership, InMemoryEntityStore, StoreError, StoredEntity};

use crate::error::ApplyError;
use crate::model::{Attribute, EntityId, IdentityParam};
use crate::profile::ProfileMode;
use crate::result::{MappingResult, TranslationResult};
use log::{debug, info};
use std::future::Future;

/// Identity side of the local identity database.
pub trait IdentityStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether any entity already carries the identity.
    fn has_identity(
        &self,
        identity: &IdentityParam,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Attach the identity to `parent`.
    fn add_identity(
        &self,
        identity: &IdentityParam,
        parent: EntityId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Attribute side of the local identity database.
pub trait AttributeStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Set an attribute of `parent`. Without `overwrite` an existing
    /// attribute in the same slot is an error.
    fn set_attribute(
        &self,
        parent: EntityId,
        attribute: &Attribute,
        overwrite: bool,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// What [`apply_translation_result`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub identities_added: usize,
    /// Identities skipped because they already existed
    pub identities_present: usize,
    pub attributes_set: usize,
}

/// Persist the to-persist part of an output translation result under `entity`.
pub async fn apply_translation_result<I, A>(
    entity: EntityId,
    result: &TranslationResult,
    identity_store: &I,
    attribute_store: &A,
) -> Result<ApplySummary, ApplyError>
where
    I: IdentityStore,
    A: AttributeStore,
{
    let mut summary = ApplySummary::default();

    for identity in result.identities_to_persist() {
        let identity_error = |e: I::Error| ApplyError::Identity {
            identity: identity.to_string(),
            source: Box::new(e),
        };
        if identity_store
            .has_identity(identity)
            .await
            .map_err(identity_error)?
        {
            debug!("Identity {} of {} already present", identity, entity);
            summary.identities_present += 1;
            continue;
        }
        identity_store
            .add_identity(identity, entity)
            .await
            .map_err(identity_error)?;
        info!("Persisted identity {} of {}", identity, entity);
        summary.identities_added += 1;
    }

    for attribute in result.attributes_to_persist() {
        attribute_store
            .set_attribute(entity, attribute, true)
            .await
            .map_err(|e| ApplyError::Attribute {
                attribute: attribute.to_string(),
                source: Box::new(e),
            })?;
        info!("Persisted attribute {} of {}", attribute, entity);
        summary.attributes_set += 1;
    }

    Ok(summary)
}

/// A mapping to merge into the local identity database.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileRequest<'a> {
    pub result: &'a MappingResult,
    /// Remote IdP the input came from
    pub idp: &'a str,
    /// Input profile that produced the result
    pub profile: &'a str,
    pub mode: ProfileMode,
}

/// How a mapping landed in the local identity database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The mapping resolved to a local entity
    Mapped {
        entity: EntityId,
        created: bool,
        /// Mapped identities the entity carries after reconciliation
        authenticated_with: Vec<IdentityParam>,
    },
    /// No identity matched and none could be created
    UnknownEntity,
}

impl ReconcileOutcome {
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::Mapped { entity, .. } => Some(*entity),
            Self::UnknownEntity => None,
        }
    }
}

/// Merges an input mapping into the local identity database.
pub trait MappingReconciler: Send + Sync {
    /// Error type for reconciliation
    type Error: std::error::Error + Send + Sync + 'static;

    fn reconcile(
        &self,
        request: ReconcileRequest<'_>,
    ) -> impl Future<Output = Result<ReconcileOutcome, Self::Error>> + Send;
}

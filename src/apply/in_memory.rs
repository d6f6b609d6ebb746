//! In-memory local identity database.
//!
//! Holds entities, their identities, attributes and group memberships
//! behind a tokio `RwLock`. Intended for tests, demos and tooling; a
//! reconciliation runs on a draft copy of the state that is committed only
//! when every step succeeded, so a failed reconciliation leaves the store
//! untouched.

use super::{AttributeStore, IdentityStore, MappingReconciler, ReconcileOutcome, ReconcileRequest};
use crate::model::{Attribute, EntityId, IdentityParam, ROOT_GROUP};
use crate::profile::ProfileMode;
use crate::result::{
    AttributeEffectMode, EntityScheduledOperation, GroupEffectMode, IdentityEffectMode,
    MappedGroup, MappingResult,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors raised by [`InMemoryEntityStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Entity {0} does not exist")]
    EntityNotFound(EntityId),

    /// Mapped identities belong to two different entities
    #[error("Identity {identity} belongs to {second} while other mapped identities belong to {first}")]
    ConflictingEntities {
        identity: String,
        first: EntityId,
        second: EntityId,
    },

    /// A `REQUIRE_MATCH` identity has no local counterpart
    #[error("Identity {identity} is required to match an existing entity")]
    IdentityNotMatched { identity: String },

    #[error("Group {group} does not exist")]
    GroupNotFound { group: String },

    #[error("Identity {identity} already belongs to {owner}")]
    IdentityTaken { identity: String, owner: EntityId },

    #[error("Attribute {attribute} of {entity} already exists")]
    AttributeExists { attribute: String, entity: EntityId },
}

/// Membership of an entity in a group, stamped with the IdP and profile
/// that created it. Manual memberships carry no origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    pub group: String,
    pub remote_idp: Option<String>,
    pub translation_profile: Option<String>,
}

impl GroupMembership {
    fn from_origin(&self, idp: &str, profile: &str) -> bool {
        self.remote_idp.as_deref() == Some(idp) && self.translation_profile.as_deref() == Some(profile)
    }
}

/// Everything the store keeps about one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntity {
    pub id: EntityId,
    pub identities: Vec<IdentityParam>,
    pub attributes: Vec<Attribute>,
    pub memberships: Vec<GroupMembership>,
    pub credential_requirement: Option<String>,
    pub scheduled_operation: Option<EntityScheduledOperation>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl StoredEntity {
    fn new(id: EntityId) -> Self {
        Self {
            id,
            identities: Vec::new(),
            attributes: Vec::new(),
            memberships: vec![GroupMembership {
                group: ROOT_GROUP.to_string(),
                remote_idp: None,
                translation_profile: None,
            }],
            credential_requirement: None,
            scheduled_operation: None,
            scheduled_time: None,
        }
    }

    pub fn is_member(&self, group: &str) -> bool {
        self.memberships.iter().any(|m| m.group == group)
    }

    pub fn attribute(&self, name: &str, group: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.group_path == group)
    }
}

#[derive(Debug, Clone)]
struct StoreState {
    next_id: u64,
    entities: BTreeMap<EntityId, StoredEntity>,
    groups: BTreeSet<String>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_id: 1,
            entities: BTreeMap::new(),
            groups: BTreeSet::from([ROOT_GROUP.to_string()]),
        }
    }
}

impl StoreState {
    fn owner_of(&self, identity: &IdentityParam) -> Option<EntityId> {
        self.entities
            .values()
            .find(|e| e.identities.iter().any(|i| i.same_identity(identity)))
            .map(|e| e.id)
    }

    fn create_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, StoredEntity::new(id));
        id
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut StoredEntity, StoreError> {
        self.entities.get_mut(&id).ok_or(StoreError::EntityNotFound(id))
    }

    fn add_identity(&mut self, identity: &IdentityParam, parent: EntityId) -> Result<(), StoreError> {
        match self.owner_of(identity) {
            Some(owner) if owner == parent => Ok(()),
            Some(owner) => Err(StoreError::IdentityTaken {
                identity: identity.to_string(),
                owner,
            }),
            None => {
                self.entity_mut(parent)?.identities.push(identity.clone());
                Ok(())
            }
        }
    }

    fn set_attribute(
        &mut self,
        parent: EntityId,
        attribute: &Attribute,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        if !self.groups.contains(&attribute.group_path) {
            return Err(StoreError::GroupNotFound {
                group: attribute.group_path.clone(),
            });
        }
        let entity = self.entity_mut(parent)?;
        match entity.attributes.iter_mut().find(|a| a.same_slot(attribute)) {
            Some(_) if !overwrite => Err(StoreError::AttributeExists {
                attribute: attribute.to_string(),
                entity: parent,
            }),
            Some(existing) => {
                *existing = attribute.clone();
                Ok(())
            }
            None => {
                entity.attributes.push(attribute.clone());
                Ok(())
            }
        }
    }

    /// Resolve the entity the mapped identities point at, creating identities
    /// (and the entity) as their effect modes allow.
    fn reconcile_identities(
        &mut self,
        result: &MappingResult,
    ) -> Result<Option<(EntityId, bool)>, StoreError> {
        let mut owner: Option<EntityId> = None;
        let mut missing = Vec::new();
        for mapped in &result.identities {
            match (self.owner_of(&mapped.identity), owner) {
                (Some(found), Some(first)) if found != first => {
                    return Err(StoreError::ConflictingEntities {
                        identity: mapped.identity.to_string(),
                        first,
                        second: found,
                    });
                }
                (Some(found), _) => owner = Some(found),
                (None, _) if mapped.mode == IdentityEffectMode::RequireMatch => {
                    return Err(StoreError::IdentityNotMatched {
                        identity: mapped.identity.to_string(),
                    });
                }
                (None, _) => missing.push(mapped),
            }
        }

        let creatable: Vec<_> = missing
            .into_iter()
            .filter(|m| match m.mode {
                IdentityEffectMode::CreateOrMatch => true,
                IdentityEffectMode::UpdateOrMatch => owner.is_some(),
                IdentityEffectMode::Match | IdentityEffectMode::RequireMatch => false,
            })
            .collect();

        let (entity, created) = match owner {
            Some(id) => (id, false),
            None if creatable.is_empty() => return Ok(None),
            None => (self.create_entity(), true),
        };
        for mapped in creatable {
            self.add_identity(&mapped.identity, entity)?;
            if mapped.credential_requirement.is_some() {
                self.entity_mut(entity)?.credential_requirement = mapped.credential_requirement.clone();
            }
            info!("Added identity {} to {}", mapped.identity, entity);
        }
        Ok(Some((entity, created)))
    }

    fn reconcile_group(&mut self, entity: EntityId, mapped: &MappedGroup) -> Result<(), StoreError> {
        let chain = group_chain(&mapped.group);
        for path in &chain {
            if self.groups.contains(path) {
                continue;
            }
            match mapped.create_if_missing {
                GroupEffectMode::CreateGroupIfMissing => {
                    info!("Created group {} for {}", path, entity);
                    self.groups.insert(path.clone());
                }
                GroupEffectMode::AddIfGroupExists => {
                    debug!("Group {} does not exist, membership of {} skipped", path, entity);
                    return Ok(());
                }
                GroupEffectMode::RequireExistingGroup => {
                    return Err(StoreError::GroupNotFound {
                        group: path.clone(),
                    });
                }
            }
        }

        let record = self.entity_mut(entity)?;
        for path in chain {
            if !record.is_member(&path) {
                debug!("Added {} to group {}", entity, path);
                record.memberships.push(GroupMembership {
                    group: path,
                    remote_idp: Some(mapped.idp.clone()),
                    translation_profile: Some(mapped.profile.clone()),
                });
            }
        }
        Ok(())
    }

    fn reconcile_attributes(&mut self, entity: EntityId, result: &MappingResult) -> Result<(), StoreError> {
        let record = self.entity_mut(entity)?;
        for mapped in &result.attributes {
            let attribute = &mapped.attribute;
            if !record.is_member(&attribute.group_path) {
                debug!(
                    "{} is not a member of {}, attribute {} skipped",
                    entity, attribute.group_path, attribute.name
                );
                continue;
            }
            let existing = record.attributes.iter_mut().find(|a| a.same_slot(attribute));
            match (mapped.mode, existing) {
                (_, Some(current)) if current.values == attribute.values => {}
                (AttributeEffectMode::CreateOnly, Some(_)) => {}
                (AttributeEffectMode::UpdateOnly, None) => {}
                (_, Some(current)) => {
                    debug!("Updated attribute {} of {}", attribute, entity);
                    *current = attribute.clone();
                }
                (_, None) => {
                    debug!("Created attribute {} of {}", attribute, entity);
                    record.attributes.push(attribute.clone());
                }
            }
        }
        Ok(())
    }

    fn remove_stale(
        &mut self,
        entity: EntityId,
        request: &ReconcileRequest<'_>,
    ) -> Result<(), StoreError> {
        let result = request.result;
        let remove_missing = request.mode == ProfileMode::UpdateAndRemoveMissing;
        let (idp, profile) = (request.idp, request.profile);
        let from_origin = |remote_idp: &Option<String>, translation_profile: &Option<String>| {
            remote_idp.as_deref() == Some(idp) && translation_profile.as_deref() == Some(profile)
        };
        let record = self.entity_mut(entity)?;

        if remove_missing || result.clean_stale_identities {
            record.identities.retain(|i| {
                let keep = !from_origin(&i.remote_idp, &i.translation_profile)
                    || result.identities.iter().any(|m| m.identity.same_identity(i));
                if !keep {
                    info!("Removed stale identity {} of {}", i, entity);
                }
                keep
            });
        }

        if remove_missing || result.clean_stale_groups {
            let mapped: BTreeSet<String> = result
                .groups
                .iter()
                .flat_map(|g| group_chain(&g.group))
                .collect();
            record.memberships.retain(|m| {
                let keep = !m.from_origin(idp, profile) || mapped.contains(&m.group);
                if !keep {
                    info!("Removed stale membership of {} in {}", entity, m.group);
                }
                keep
            });
            let memberships = &record.memberships;
            record
                .attributes
                .retain(|a| memberships.iter().any(|m| m.group == a.group_path));
        }

        if remove_missing || result.clean_stale_attributes {
            record.attributes.retain(|a| {
                let keep = !from_origin(&a.remote_idp, &a.translation_profile)
                    || result.attributes.iter().any(|m| m.attribute.same_slot(a));
                if !keep {
                    info!("Removed stale attribute {} of {}", a, entity);
                }
                keep
            });
        }
        Ok(())
    }

    fn reconcile(&mut self, request: &ReconcileRequest<'_>) -> Result<ReconcileOutcome, StoreError> {
        let result = request.result;
        let Some((entity, created)) = self.reconcile_identities(result)? else {
            debug!(
                "No entity matched the mapping of profile '{}' from {}",
                request.profile, request.idp
            );
            return Ok(ReconcileOutcome::UnknownEntity);
        };
        if created {
            info!(
                "Created {} from the mapping of profile '{}' from {}",
                entity, request.profile, request.idp
            );
        }

        for group in &result.groups {
            self.reconcile_group(entity, group)?;
        }
        self.reconcile_attributes(entity, result)?;

        let record = self.entity_mut(entity)?;
        for change in &result.entity_changes {
            debug!(
                "Scheduled {:?} of {} at {:?}",
                change.scheduled_operation, entity, change.scheduled_time
            );
            record.scheduled_operation = change.scheduled_operation;
            record.scheduled_time = change.scheduled_time;
        }

        self.remove_stale(entity, request)?;

        let record = self.entity_mut(entity)?;
        let authenticated_with = result
            .identities
            .iter()
            .filter_map(|m| {
                record
                    .identities
                    .iter()
                    .find(|i| i.same_identity(&m.identity))
                    .cloned()
            })
            .collect();
        Ok(ReconcileOutcome::Mapped {
            entity,
            created,
            authenticated_with,
        })
    }
}

/// `/a/b/c` → `["/a", "/a/b", "/a/b/c"]`; the root group yields nothing.
fn group_chain(path: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        chain.push(current.clone());
    }
    chain
}

/// Thread-safe in-memory identity database.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity carrying the given identities.
    pub async fn create_entity(
        &self,
        identities: impl IntoIterator<Item = IdentityParam>,
    ) -> Result<EntityId, StoreError> {
        let mut state = self.state.write().await;
        let mut draft = state.clone();
        let id = draft.create_entity();
        for identity in identities {
            draft.add_identity(&identity, id)?;
        }
        *state = draft;
        Ok(id)
    }

    /// Create a group and any missing ancestors.
    pub async fn create_group(&self, path: &str) {
        let mut state = self.state.write().await;
        state.groups.extend(group_chain(path));
    }

    /// Add an entity to a group it is not yet a member of, without origin.
    pub async fn add_membership(&self, entity: EntityId, group: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.groups.contains(group) {
            return Err(StoreError::GroupNotFound {
                group: group.to_string(),
            });
        }
        let record = state.entity_mut(entity)?;
        if !record.is_member(group) {
            record.memberships.push(GroupMembership {
                group: group.to_string(),
                remote_idp: None,
                translation_profile: None,
            });
        }
        Ok(())
    }

    pub async fn entity(&self, id: EntityId) -> Option<StoredEntity> {
        self.state.read().await.entities.get(&id).cloned()
    }

    /// Entity owning an identity of the given type and value.
    pub async fn find_entity(&self, identity: &IdentityParam) -> Option<EntityId> {
        self.state.read().await.owner_of(identity)
    }

    pub async fn group_exists(&self, path: &str) -> bool {
        self.state.read().await.groups.contains(path)
    }

    pub async fn groups(&self) -> Vec<String> {
        self.state.read().await.groups.iter().cloned().collect()
    }

    pub async fn entity_count(&self) -> usize {
        self.state.read().await.entities.len()
    }
}

impl IdentityStore for InMemoryEntityStore {
    type Error = StoreError;

    async fn has_identity(&self, identity: &IdentityParam) -> Result<bool, Self::Error> {
        Ok(self.state.read().await.owner_of(identity).is_some())
    }

    async fn add_identity(&self, identity: &IdentityParam, parent: EntityId) -> Result<(), Self::Error> {
        self.state.write().await.add_identity(identity, parent)
    }
}

impl AttributeStore for InMemoryEntityStore {
    type Error = StoreError;

    async fn set_attribute(
        &self,
        parent: EntityId,
        attribute: &Attribute,
        overwrite: bool,
    ) -> Result<(), Self::Error> {
        self.state
            .write()
            .await
            .set_attribute(parent, attribute, overwrite)
    }
}

impl MappingReconciler for InMemoryEntityStore {
    type Error = StoreError;

    async fn reconcile(&self, request: ReconcileRequest<'_>) -> Result<ReconcileOutcome, Self::Error> {
        let mut state = self.state.write().await;
        let mut draft = state.clone();
        let outcome = draft.reconcile(&request)?;
        *state = draft;
        Ok(outcome)
    }
}

use super::*;
use crate::model::ROOT_GROUP;
use crate::result::{
    AttributeEffectMode, DynamicAttribute, EntityChange, EntityScheduledOperation,
    GroupEffectMode, IdentityEffectMode, MappedAttribute, MappedGroup, MappedIdentity,
};
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const IDP: &str = "idp1";
const PROFILE: &str = "sso";

fn identity(type_id: &str, value: &str) -> IdentityParam {
    IdentityParam::new(type_id, value).with_origin(Some(IDP), Some(PROFILE))
}

fn mapped_identity(type_id: &str, value: &str, mode: IdentityEffectMode) -> MappedIdentity {
    MappedIdentity {
        mode,
        identity: identity(type_id, value),
        credential_requirement: None,
    }
}

fn mapped_attribute(name: &str, group: &str, value: &str, mode: AttributeEffectMode) -> MappedAttribute {
    MappedAttribute {
        mode,
        attribute: Attribute::new(name, group, [value]).with_origin(Some(IDP), Some(PROFILE)),
    }
}

fn mapped_group(group: &str, mode: GroupEffectMode) -> MappedGroup {
    MappedGroup {
        group: group.to_string(),
        create_if_missing: mode,
        idp: IDP.to_string(),
        profile: PROFILE.to_string(),
    }
}

fn request(result: &MappingResult, mode: ProfileMode) -> ReconcileRequest<'_> {
    ReconcileRequest {
        result,
        idp: IDP,
        profile: PROFILE,
        mode,
    }
}

#[tokio::test]
async fn test_apply_persists_identities_then_attributes() {
    let store = InMemoryEntityStore::new();
    let entity = store.create_entity([IdentityParam::new("userName", "joe")]).await.unwrap();

    let mut result = TranslationResult::new();
    result.add_identity_to_persist(IdentityParam::new("userName", "joe"));
    result.add_identity_to_persist(IdentityParam::new("email", "joe@example.com"));
    result.add_attribute_to_persist(Attribute::new("nick", ROOT_GROUP, ["joey"]));

    let summary = apply_translation_result(entity, &result, &store, &store).await.unwrap();
    assert_eq!(
        summary,
        ApplySummary {
            identities_added: 1,
            identities_present: 1,
            attributes_set: 1,
        }
    );

    let stored = store.entity(entity).await.unwrap();
    assert_eq!(stored.identities.len(), 2);
    assert_eq!(stored.attribute("nick", ROOT_GROUP).unwrap().values, vec!["joey"]);

    // applying again rewrites nothing new
    let again = apply_translation_result(entity, &result, &store, &store).await.unwrap();
    assert_eq!(again.identities_added, 0);
    assert_eq!(store.entity(entity).await.unwrap().attributes.len(), 1);
}

/// Store that records calls and fails on a chosen attribute.
#[derive(Default)]
struct RecordingStore {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    writes: AtomicUsize,
}

impl IdentityStore for RecordingStore {
    type Error = StoreError;

    async fn has_identity(&self, identity: &IdentityParam) -> Result<bool, Self::Error> {
        self.calls.lock().unwrap().push(format!("has {}", identity.value));
        Ok(false)
    }

    async fn add_identity(&self, identity: &IdentityParam, _parent: EntityId) -> Result<(), Self::Error> {
        self.calls.lock().unwrap().push(format!("add {}", identity.value));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl AttributeStore for RecordingStore {
    type Error = StoreError;

    async fn set_attribute(
        &self,
        _parent: EntityId,
        attribute: &Attribute,
        overwrite: bool,
    ) -> Result<(), Self::Error> {
        assert!(overwrite);
        self.calls.lock().unwrap().push(format!("set {}", attribute.name));
        if self.fail_on.as_deref() == Some(attribute.name.as_str()) {
            return Err(StoreError::GroupNotFound {
                group: attribute.group_path.clone(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_apply_aborts_on_first_failure() {
    let store = RecordingStore {
        fail_on: Some("b".to_string()),
        ..Default::default()
    };
    let mut result = TranslationResult::new();
    result.add_identity_to_persist(IdentityParam::new("userName", "joe"));
    result.add_attribute_to_persist(Attribute::new("a", ROOT_GROUP, ["1"]));
    result.add_attribute_to_persist(Attribute::new("b", ROOT_GROUP, ["2"]));
    result.add_attribute_to_persist(Attribute::new("c", ROOT_GROUP, ["3"]));

    let err = apply_translation_result(EntityId(7), &result, &store, &store)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplyError::Attribute { ref attribute, .. } if attribute.starts_with("b@")));
    assert_eq!(
        *store.calls.lock().unwrap(),
        vec!["has joe", "add joe", "set a", "set b"]
    );
    // earlier writes are not rolled back
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_apply_ignores_exposed_only_data() {
    let store = InMemoryEntityStore::new();
    let entity = store.create_entity([]).await.unwrap();
    let mut result = TranslationResult::new();
    result.add_attribute(DynamicAttribute::new(Attribute::new("o", ROOT_GROUP, ["x"])));
    result.add_identity(IdentityParam::new("email", "a@b.org"));

    let summary = apply_translation_result(entity, &result, &store, &store).await.unwrap();
    assert_eq!(summary, ApplySummary::default());
}

#[tokio::test]
async fn test_reconcile_creates_entity() {
    let store = InMemoryEntityStore::new();
    let mut result = MappingResult::new();
    result.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::CreateOrMatch));
    result.add_group(mapped_group("/staff/dev", GroupEffectMode::CreateGroupIfMissing));
    result.add_attribute(mapped_attribute("mail", "/staff", "joe@example.com", AttributeEffectMode::CreateOrUpdate));

    let outcome = store.reconcile(request(&result, ProfileMode::UpdateOnly)).await.unwrap();
    let ReconcileOutcome::Mapped {
        entity,
        created,
        authenticated_with,
    } = outcome
    else {
        panic!("expected a mapped entity");
    };
    assert!(created);
    assert_eq!(authenticated_with, vec![identity("userName", "joe")]);
    assert!(store.group_exists("/staff").await);
    assert!(store.group_exists("/staff/dev").await);

    let stored = store.entity(entity).await.unwrap();
    assert!(stored.is_member("/staff") && stored.is_member("/staff/dev"));
    assert_eq!(stored.attribute("mail", "/staff").unwrap().values, vec!["joe@example.com"]);
}

#[tokio::test]
async fn test_reconcile_matches_existing_entity() {
    let store = InMemoryEntityStore::new();
    let existing = store.create_entity([IdentityParam::new("userName", "joe")]).await.unwrap();

    let mut result = MappingResult::new();
    result.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::Match));
    result.add_identity(mapped_identity("email", "joe@example.com", IdentityEffectMode::UpdateOrMatch));

    let outcome = store.reconcile(request(&result, ProfileMode::UpdateOnly)).await.unwrap();
    assert_eq!(outcome.entity(), Some(existing));
    assert_eq!(store.entity(existing).await.unwrap().identities.len(), 2);
    assert_eq!(store.entity_count().await, 1);
}

#[tokio::test]
async fn test_reconcile_identity_rules() {
    let store = InMemoryEntityStore::new();
    let first = store.create_entity([IdentityParam::new("userName", "a")]).await.unwrap();
    let second = store.create_entity([IdentityParam::new("userName", "b")]).await.unwrap();

    let mut conflicting = MappingResult::new();
    conflicting.add_identity(mapped_identity("userName", "a", IdentityEffectMode::Match));
    conflicting.add_identity(mapped_identity("userName", "b", IdentityEffectMode::Match));
    assert_eq!(
        store.reconcile(request(&conflicting, ProfileMode::UpdateOnly)).await,
        Err(StoreError::ConflictingEntities {
            identity: "[userName] b".to_string(),
            first,
            second,
        })
    );

    let mut required = MappingResult::new();
    required.add_identity(mapped_identity("userName", "c", IdentityEffectMode::RequireMatch));
    assert!(matches!(
        store.reconcile(request(&required, ProfileMode::UpdateOnly)).await,
        Err(StoreError::IdentityNotMatched { .. })
    ));

    let mut unknown = MappingResult::new();
    unknown.add_identity(mapped_identity("userName", "c", IdentityEffectMode::Match));
    unknown.add_identity(mapped_identity("email", "c@x.org", IdentityEffectMode::UpdateOrMatch));
    unknown.add_group(mapped_group("/staff", GroupEffectMode::CreateGroupIfMissing));
    assert_eq!(
        store.reconcile(request(&unknown, ProfileMode::UpdateOnly)).await,
        Ok(ReconcileOutcome::UnknownEntity)
    );
    assert!(!store.group_exists("/staff").await);
    assert_eq!(store.entity_count().await, 2);
}

#[tokio::test]
async fn test_reconcile_group_modes() {
    let store = InMemoryEntityStore::new();
    store.create_group("/staff").await;

    let mut result = MappingResult::new();
    result.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::CreateOrMatch));
    result.add_group(mapped_group("/staff", GroupEffectMode::RequireExistingGroup));
    result.add_group(mapped_group("/guests", GroupEffectMode::AddIfGroupExists));
    let entity = store
        .reconcile(request(&result, ProfileMode::UpdateOnly))
        .await
        .unwrap()
        .entity()
        .unwrap();
    let stored = store.entity(entity).await.unwrap();
    assert!(stored.is_member("/staff"));
    assert!(!stored.is_member("/guests"));
    assert!(!store.group_exists("/guests").await);

    result.add_group(mapped_group("/missing", GroupEffectMode::RequireExistingGroup));
    assert_eq!(
        store.reconcile(request(&result, ProfileMode::UpdateOnly)).await,
        Err(StoreError::GroupNotFound {
            group: "/missing".to_string()
        })
    );
}

#[tokio::test]
async fn test_reconcile_failure_leaves_store_untouched() {
    let store = InMemoryEntityStore::new();
    let mut result = MappingResult::new();
    result.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::CreateOrMatch));
    result.add_group(mapped_group("/a", GroupEffectMode::CreateGroupIfMissing));
    result.add_group(mapped_group("/b", GroupEffectMode::RequireExistingGroup));

    assert!(store.reconcile(request(&result, ProfileMode::UpdateOnly)).await.is_err());
    assert_eq!(store.entity_count().await, 0);
    assert!(!store.group_exists("/a").await);
}

#[tokio::test]
async fn test_reconcile_attribute_modes() {
    let store = InMemoryEntityStore::new();
    let entity = store.create_entity([IdentityParam::new("userName", "joe")]).await.unwrap();
    store
        .set_attribute(entity, &Attribute::new("cn", ROOT_GROUP, ["Joe"]), true)
        .await
        .unwrap();

    let mut result = MappingResult::new();
    result.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::Match));
    result.add_attribute(mapped_attribute("cn", ROOT_GROUP, "Joseph", AttributeEffectMode::CreateOnly));
    result.add_attribute(mapped_attribute("sn", ROOT_GROUP, "Doe", AttributeEffectMode::UpdateOnly));
    result.add_attribute(mapped_attribute("mail", ROOT_GROUP, "j@x.org", AttributeEffectMode::CreateOrUpdate));
    result.add_attribute(mapped_attribute("ou", "/nowhere", "dev", AttributeEffectMode::CreateOrUpdate));
    store.reconcile(request(&result, ProfileMode::UpdateOnly)).await.unwrap();

    let stored = store.entity(entity).await.unwrap();
    assert_eq!(stored.attribute("cn", ROOT_GROUP).unwrap().values, vec!["Joe"]);
    assert!(stored.attribute("sn", ROOT_GROUP).is_none());
    assert!(stored.attribute("ou", "/nowhere").is_none());
    assert_eq!(stored.attribute("mail", ROOT_GROUP).unwrap().values, vec!["j@x.org"]);

    let mut update = MappingResult::new();
    update.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::Match));
    update.add_attribute(mapped_attribute("cn", ROOT_GROUP, "Joseph", AttributeEffectMode::UpdateOnly));
    store.reconcile(request(&update, ProfileMode::UpdateOnly)).await.unwrap();
    assert_eq!(
        store.entity(entity).await.unwrap().attribute("cn", ROOT_GROUP).unwrap().values,
        vec!["Joseph"]
    );
}

#[tokio::test]
async fn test_reconcile_records_entity_change() {
    let store = InMemoryEntityStore::new();
    let at = Utc::now();
    let mut result = MappingResult::new();
    result.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::CreateOrMatch));
    result.add_entity_change(EntityChange {
        scheduled_operation: Some(EntityScheduledOperation::Remove),
        scheduled_time: Some(at),
    });

    let entity = store
        .reconcile(request(&result, ProfileMode::UpdateOnly))
        .await
        .unwrap()
        .entity()
        .unwrap();
    let stored = store.entity(entity).await.unwrap();
    assert_eq!(stored.scheduled_operation, Some(EntityScheduledOperation::Remove));
    assert_eq!(stored.scheduled_time, Some(at));
}

async fn seeded_for_stale_removal() -> (InMemoryEntityStore, EntityId) {
    let store = InMemoryEntityStore::new();
    let mut first = MappingResult::new();
    first.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::CreateOrMatch));
    first.add_identity(mapped_identity("email", "old@x.org", IdentityEffectMode::CreateOrMatch));
    first.add_group(mapped_group("/old", GroupEffectMode::CreateGroupIfMissing));
    first.add_attribute(mapped_attribute("cn", ROOT_GROUP, "Joe", AttributeEffectMode::CreateOrUpdate));
    first.add_attribute(mapped_attribute("title", "/old", "boss", AttributeEffectMode::CreateOrUpdate));
    let entity = store
        .reconcile(request(&first, ProfileMode::UpdateOnly))
        .await
        .unwrap()
        .entity()
        .unwrap();
    store
        .set_attribute(entity, &Attribute::new("manual", ROOT_GROUP, ["kept"]), true)
        .await
        .unwrap();
    (store, entity)
}

fn second_login() -> MappingResult {
    let mut second = MappingResult::new();
    second.add_identity(mapped_identity("userName", "joe", IdentityEffectMode::Match));
    second
}

#[tokio::test]
async fn test_update_only_keeps_stale_data() {
    let (store, entity) = seeded_for_stale_removal().await;
    store
        .reconcile(request(&second_login(), ProfileMode::UpdateOnly))
        .await
        .unwrap();
    let stored = store.entity(entity).await.unwrap();
    assert_eq!(stored.identities.len(), 2);
    assert!(stored.is_member("/old"));
    assert_eq!(stored.attributes.len(), 3);
}

#[tokio::test]
async fn test_remove_missing_drops_stale_data_of_same_origin() {
    let (store, entity) = seeded_for_stale_removal().await;
    store
        .reconcile(request(&second_login(), ProfileMode::UpdateAndRemoveMissing))
        .await
        .unwrap();
    let stored = store.entity(entity).await.unwrap();
    assert_eq!(stored.identities, vec![identity("userName", "joe")]);
    assert!(!stored.is_member("/old"));
    assert!(stored.is_member(ROOT_GROUP));
    let names: Vec<&str> = stored.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["manual"]);
}

#[tokio::test]
async fn test_clean_stale_flags_select_what_is_removed() {
    let (store, entity) = seeded_for_stale_removal().await;
    let mut second = second_login();
    second.clean_stale_attributes = true;
    store
        .reconcile(request(&second, ProfileMode::UpdateOnly))
        .await
        .unwrap();
    let stored = store.entity(entity).await.unwrap();
    assert_eq!(stored.identities.len(), 2);
    assert!(stored.is_member("/old"));
    let names: Vec<&str> = stored.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["manual"]);
}

#[tokio::test]
async fn test_store_rejects_foreign_identity_and_missing_group() {
    let store = InMemoryEntityStore::new();
    let a = store.create_entity([IdentityParam::new("userName", "a")]).await.unwrap();
    let b = store.create_entity([]).await.unwrap();

    assert_eq!(
        store.add_identity(&IdentityParam::new("userName", "a"), b).await,
        Err(StoreError::IdentityTaken {
            identity: "[userName] a".to_string(),
            owner: a,
        })
    );
    assert!(store.add_identity(&IdentityParam::new("userName", "a"), a).await.is_ok());
    assert!(matches!(
        store.set_attribute(a, &Attribute::new("x", "/nope", ["1"]), true).await,
        Err(StoreError::GroupNotFound { .. })
    ));
    assert!(matches!(
        store.add_membership(EntityId(99), ROOT_GROUP).await,
        Err(StoreError::EntityNotFound(EntityId(99)))
    ));
}

#[tokio::test]
async fn test_set_attribute_without_overwrite() {
    let store = InMemoryEntityStore::new();
    let entity = store.create_entity([]).await.unwrap();
    let attribute = Attribute::new("cn", ROOT_GROUP, ["Joe"]);
    store.set_attribute(entity, &attribute, false).await.unwrap();
    assert!(matches!(
        store.set_attribute(entity, &attribute, false).await,
        Err(StoreError::AttributeExists { .. })
    ));
}

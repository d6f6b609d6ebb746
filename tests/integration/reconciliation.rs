//! Input mappings handed to reconcilers.

use crate::common::{RecordingReconciler, fixtures, remote_input};
use identity_translation::action::ActionRegistry;
use identity_translation::apply::{InMemoryEntityStore, ReconcileOutcome, StoreError};
use identity_translation::engine::{TranslationEngine, TranslationEngineBuilder};
use identity_translation::error::EngineError;
use identity_translation::model::IdentityParam;
use identity_translation::profile::{InputTranslationProfile, ProfileMode};
use identity_translation::result::IdentityEffectMode;

/// Serialize and reload the profile before building the engine around it.
fn engine_after_round_trip(mode: &str) -> TranslationEngine {
    let registry = ActionRegistry::with_builtin_actions();
    let loaded = InputTranslationProfile::from_json(&fixtures::sso_profile(mode), &registry).unwrap();
    let text = loaded.to_json_string().unwrap();
    let reloaded = InputTranslationProfile::from_json_str(&text, &registry).unwrap();
    TranslationEngineBuilder::new()
        .with_input_profile(reloaded)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_reconciler_receives_the_profile_mode_unchanged() {
    for (raw, expected) in [
        ("UPDATE_ONLY", ProfileMode::UpdateOnly),
        ("UPDATE_AND_REMOVE_MISSING", ProfileMode::UpdateAndRemoveMissing),
    ] {
        let engine = engine_after_round_trip(raw);
        let reconciler = RecordingReconciler::default();

        let outcome = engine
            .process_input("sso", &remote_input("joe", Some("joe@example.com")), &reconciler)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::UnknownEntity);
        let received = reconciler.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].mode, expected);
        assert_eq!(received[0].profile, "sso");
        assert_eq!(received[0].idp, "https://idp.example.org");
        assert_eq!(received[0].result.identities.len(), 1);
    }
}

#[tokio::test]
async fn test_first_login_creates_then_matches() {
    let engine = engine_after_round_trip("UPDATE_ONLY");
    let store = InMemoryEntityStore::new();
    let input = remote_input("joe", Some("joe@example.com"));

    let first = engine.process_input("sso", &input, &store).await.unwrap();
    let ReconcileOutcome::Mapped {
        entity, created, ..
    } = first
    else {
        panic!("expected a mapped entity");
    };
    assert!(created);

    let second = engine.process_input("sso", &input, &store).await.unwrap();
    assert_eq!(
        second,
        ReconcileOutcome::Mapped {
            entity,
            created: false,
            authenticated_with: vec![IdentityParam::new("userName", "joe")
                .with_origin(Some("https://idp.example.org"), Some("sso"))],
        }
    );
    assert_eq!(store.entity_count().await, 1);
    let stored = store.entity(entity).await.unwrap();
    assert!(stored.is_member("/remote") && stored.is_member("/remote/staff"));
}

#[tokio::test]
async fn test_remove_missing_mode_drops_what_the_idp_stopped_asserting() {
    let engine = engine_after_round_trip("UPDATE_AND_REMOVE_MISSING");
    let store = InMemoryEntityStore::new();

    let entity = engine
        .process_input("sso", &remote_input("joe", Some("joe@example.com")), &store)
        .await
        .unwrap()
        .entity()
        .unwrap();
    assert!(store.entity(entity).await.unwrap().attribute("mail", "/").is_some());

    let without_groups = identity_translation::model::RemotelyAuthenticatedInput::new("https://idp.example.org")
        .with_identity("userName", "joe");
    engine
        .process_input("sso", &without_groups, &store)
        .await
        .unwrap();

    let stored = store.entity(entity).await.unwrap();
    assert!(stored.attribute("mail", "/").is_none());
    assert!(!stored.is_member("/remote/staff"));
    assert!(store.group_exists("/remote/staff").await);
}

#[tokio::test]
async fn test_store_errors_surface_as_reconcile_errors() {
    let document = crate::common::ProfileBuilder::input("strict")
        .always("mapIdentity", &["userName", "id", "", "REQUIRE_MATCH"])
        .build();
    let engine = TranslationEngineBuilder::new()
        .with_profile_json(document)
        .build()
        .unwrap();
    let store = InMemoryEntityStore::new();

    let err = engine
        .process_input("strict", &remote_input("ghost", None), &store)
        .await
        .unwrap_err();

    let EngineError::Reconcile(source) = err else {
        panic!("expected a reconciliation failure");
    };
    assert_eq!(
        source.downcast_ref::<StoreError>(),
        Some(&StoreError::IdentityNotMatched {
            identity: "[userName] ghost".to_string()
        })
    );
    assert_eq!(store.entity_count().await, 0);

    let profile = engine.input_profile("strict").unwrap();
    let mapped = profile.translate(&remote_input("ghost", None)).unwrap();
    assert_eq!(mapped.identities[0].mode, IdentityEffectMode::RequireMatch);
}

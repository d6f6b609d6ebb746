//! End-to-end translation scenarios.

use crate::common::{self, ProfileBuilder, fixtures, local_input, remote_input, spy_registry};
use identity_translation::action::ActionRegistry;
use identity_translation::apply::InMemoryEntityStore;
use identity_translation::engine::TranslationEngineBuilder;
use identity_translation::error::{ActionError, EngineError, TranslationError};
use identity_translation::model::{EntityId, IdentityParam, RemotelyAuthenticatedInput};
use identity_translation::profile::{InputTranslationProfile, OutputTranslationProfile};

#[test]
fn test_mail_is_mapped_when_email_is_asserted() {
    common::init_logging();
    let registry = ActionRegistry::with_builtin_actions();
    let profile = InputTranslationProfile::from_json(&fixtures::mail_profile(), &registry).unwrap();

    let input = RemotelyAuthenticatedInput::new("idp").with_attribute("email", ["a@b.org"]);
    let result = profile.translate(&input).unwrap();

    assert_eq!(result.attributes.len(), 1);
    let mail = &result.attributes[0].attribute;
    assert_eq!(mail.name, "mail");
    assert_eq!(mail.values, vec!["a@b.org"]);
    assert_eq!(mail.remote_idp.as_deref(), Some("idp"));
    assert_eq!(mail.translation_profile.as_deref(), Some("mail"));
}

#[test]
fn test_rule_is_skipped_without_email() {
    let registry = ActionRegistry::with_builtin_actions();
    let profile = InputTranslationProfile::from_json(&fixtures::mail_profile(), &registry).unwrap();

    let result = profile.translate(&RemotelyAuthenticatedInput::new("idp")).unwrap();

    assert!(result.attributes.is_empty());
    assert!(result.is_empty());
}

#[test]
fn test_sso_profile_maps_identity_attribute_and_group() {
    let registry = ActionRegistry::with_builtin_actions();
    let profile =
        InputTranslationProfile::from_json(&fixtures::sso_profile("UPDATE_ONLY"), &registry).unwrap();

    let result = profile
        .translate(&remote_input("joe", Some("joe@example.com")))
        .unwrap();

    assert_eq!(result.identities.len(), 1);
    assert_eq!(result.identities[0].identity.value, "joe");
    assert_eq!(result.attributes[0].attribute.values, vec!["joe@example.com"]);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].group, "/remote/staff");
    assert_eq!(result.groups[0].idp, "https://idp.example.org");
}

#[test]
fn test_condition_failure_reports_profile_and_rule() {
    let registry = ActionRegistry::with_builtin_actions();
    let document = ProfileBuilder::input("broken")
        .always("mapIdentity", &["userName", "id"])
        .rule("attr['email'].unknownMethod()", "mapAttribute", &["mail", "/", "attr['email']"])
        .build();
    let profile = InputTranslationProfile::from_json(&document, &registry).unwrap();

    let err = profile
        .translate(&remote_input("joe", Some("joe@example.com")))
        .unwrap_err();
    assert!(matches!(err, TranslationError::ConditionEvaluation { .. }));
    assert_eq!(err.profile(), "broken");
    assert_eq!(err.rule_index(), 2);
}

#[test]
fn test_action_failure_aborts_translation() {
    let registry = ActionRegistry::with_builtin_actions();
    let document = ProfileBuilder::input("groups")
        .always("mapGroup", &["'relative'"])
        .build();
    let profile = InputTranslationProfile::from_json(&document, &registry).unwrap();

    let err = profile.translate(&remote_input("joe", None)).unwrap_err();
    match err {
        TranslationError::ActionInvocation {
            rule_index, source, ..
        } => {
            assert_eq!(rule_index, 1);
            assert!(matches!(source, ActionError::InvalidValue { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_output_release_profile() {
    let registry = ActionRegistry::with_builtin_actions();
    let profile = OutputTranslationProfile::from_json(&fixtures::release_profile(), &registry).unwrap();

    let result = profile.translate(&local_input(EntityId(1))).unwrap();

    let names: Vec<&str> = result.attributes().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["displayName", "lastRelease"]);
    assert_eq!(
        result.attribute("displayName").unwrap().attribute.values,
        vec!["Joe Doe"]
    );
    assert_eq!(
        result.attributes_to_persist()[0].values,
        vec!["https://sp.example.org"]
    );
    assert_eq!(result.identities_to_persist()[0].value, "tid-22");
    assert_eq!(result.redirect_url(), None);
}

#[test]
fn test_output_spies_run_in_order_until_break() {
    let (registry, log) = spy_registry();
    let document = ProfileBuilder::output("spies")
        .always("outputSpy", &["first"])
        .rule("false", "outputSpy", &["skipped"])
        .always("outputSpy", &["second", "BREAK"])
        .always("outputSpy", &["never"])
        .build();
    let profile = OutputTranslationProfile::from_json(&document, &registry).unwrap();

    let result = profile.translate(&local_input(EntityId(1))).unwrap();

    assert_eq!(log.calls(), vec!["first", "second"]);
    let names: Vec<&str> = result.attributes().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn test_engine_output_pipeline_persists_marked_data() {
    let engine = TranslationEngineBuilder::new()
        .with_profile_json(fixtures::release_profile())
        .build()
        .unwrap();
    let store = InMemoryEntityStore::new();
    let entity = store
        .create_entity([IdentityParam::new("userName", "joe")])
        .await
        .unwrap();

    let (result, summary) = engine
        .process_output("release", &local_input(entity), entity, &store, &store)
        .await
        .unwrap();

    assert_eq!(result.attributes().len(), 2);
    assert_eq!(summary.identities_added, 1);
    assert_eq!(summary.attributes_set, 1);
    let stored = store.entity(entity).await.unwrap();
    assert!(stored.identities.iter().any(|i| i.value == "tid-22"));
    assert_eq!(
        stored.attribute("lastRelease", "/").unwrap().values,
        vec!["https://sp.example.org"]
    );
}

#[tokio::test]
async fn test_failed_output_translation_applies_nothing() {
    let document = ProfileBuilder::output("failing")
        .always("createPersistentAttribute", &["a", "'x'"])
        .always("redirect", &["['a', 'b']"])
        .build();
    let engine = TranslationEngineBuilder::new()
        .with_profile_json(document)
        .build()
        .unwrap();
    let store = InMemoryEntityStore::new();
    let entity = store.create_entity([]).await.unwrap();

    let err = engine
        .process_output("failing", &local_input(entity), entity, &store, &store)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Translation(_)));
    assert!(store.entity(entity).await.unwrap().attributes.is_empty());
}

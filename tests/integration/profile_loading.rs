//! Loading profiles from JSON and directories, and profile inclusion.

use crate::common::{ProfileBuilder, fixtures, remote_input};
use identity_translation::action::ActionRegistry;
use identity_translation::engine::TranslationEngineBuilder;
use identity_translation::error::{ActionError, EngineError, ProfileError, RegistryError, TranslationError};
use identity_translation::model::EntityId;
use identity_translation::profile::{
    InputTranslationProfile, ProfileDirection, ProfileMode, ProfileRepository,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn write_profiles(dir: &TempDir, documents: &[(&str, serde_json::Value)]) {
    for (file, document) in documents {
        fs::write(
            dir.path().join(file),
            serde_json::to_string_pretty(document).unwrap(),
        )
        .unwrap();
    }
}

#[test]
fn test_profile_directory_loads_both_directions() {
    let dir = TempDir::new().unwrap();
    write_profiles(
        &dir,
        &[
            ("10-mail.json", fixtures::mail_profile()),
            ("20-release.json", fixtures::release_profile()),
            (
                "30-legacy.json",
                json!({
                    "name": "legacy",
                    "rules": [
                        {"condition": {"conditionValue": "true"}, "action": {"name": "createUser", "parameters": []}},
                        {"condition": {"conditionValue": "true"}, "action": {"name": "mapIdentity", "parameters": ["userName", "id", "cr"]}}
                    ]
                }),
            ),
        ],
    );
    fs::write(dir.path().join("notes.txt"), "not a profile").unwrap();

    let registry = ActionRegistry::with_builtin_actions();
    let repository = ProfileRepository::from_profile_dir(dir.path(), &registry).unwrap();

    assert_eq!(repository.len(), 3);
    assert_eq!(repository.names(ProfileDirection::Input), vec!["legacy", "mail"]);
    assert_eq!(repository.names(ProfileDirection::Output), vec!["release"]);
}

#[test]
fn test_engine_reads_profile_directory() {
    let dir = TempDir::new().unwrap();
    write_profiles(&dir, &[("mail.json", fixtures::mail_profile())]);

    let engine = TranslationEngineBuilder::new()
        .with_profile_dir(dir.path())
        .with_profile_json(fixtures::release_profile())
        .build()
        .unwrap();

    let result = engine
        .translate_input("mail", &remote_input("joe", Some("joe@example.com")))
        .unwrap();
    assert_eq!(result.attributes.len(), 1);
    assert!(engine.translate_output("release", &crate::common::local_input(EntityId(1))).is_ok());
}

#[test]
fn test_invalid_profile_file_fails_the_build() {
    let dir = TempDir::new().unwrap();
    write_profiles(
        &dir,
        &[(
            "bad.json",
            ProfileBuilder::input("bad")
                .always("mapIdentity", &["userName", "id"])
                .always("noSuchAction", &[])
                .build(),
        )],
    );

    let built = TranslationEngineBuilder::new().with_profile_dir(dir.path()).build();
    match built {
        Err(ProfileError::Action {
            profile,
            rule_index,
            source: RegistryError::ActionNotFound(action),
        }) => {
            assert_eq!(profile, "bad");
            assert_eq!(rule_index, 2);
            assert_eq!(action, "noSuchAction");
        }
        other => panic!("unexpected build outcome: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_profile_directory() {
    let built = TranslationEngineBuilder::new()
        .with_profile_dir("/nonexistent/profiles")
        .build();
    assert!(matches!(built, Err(ProfileError::Io { .. })));
}

#[test]
fn test_output_action_in_input_profile_is_rejected() {
    let registry = ActionRegistry::with_builtin_actions();
    let document = ProfileBuilder::input("mixed")
        .always("createAttribute", &["a", "'b'"])
        .build();
    assert!(matches!(
        InputTranslationProfile::from_json(&document, &registry),
        Err(ProfileError::ActionDirectionMismatch { rule_index: 1, .. })
    ));
}

#[test]
fn test_included_profile_results_are_merged_in_place() {
    let engine = TranslationEngineBuilder::new()
        .with_profile_json(
            ProfileBuilder::input("common")
                .always("mapIdentity", &["userName", "id"])
                .build(),
        )
        .with_profile_json(
            ProfileBuilder::input("main")
                .with_mode("UPDATE_AND_REMOVE_MISSING")
                .always("mapAttribute", &["first", "/", "'1'"])
                .always("includeInputProfile", &["common"])
                .always("mapAttribute", &["last", "/", "'2'"])
                .build(),
        )
        .build()
        .unwrap();

    let result = engine
        .translate_input("main", &remote_input("joe", None))
        .unwrap();

    assert_eq!(result.identities.len(), 1);
    assert_eq!(result.identities[0].identity.translation_profile.as_deref(), Some("common"));
    let names: Vec<&str> = result.attributes.iter().map(|a| a.attribute.name.as_str()).collect();
    assert_eq!(names, vec!["first", "last"]);
    assert_eq!(
        engine.input_profile("main").unwrap().mode(),
        ProfileMode::UpdateAndRemoveMissing
    );
}

#[test]
fn test_mutual_inclusion_is_detected() {
    let engine = TranslationEngineBuilder::new()
        .with_profile_json(
            ProfileBuilder::output("a")
                .always("includeOutputProfile", &["b"])
                .build(),
        )
        .with_profile_json(
            ProfileBuilder::output("b")
                .always("includeOutputProfile", &["a"])
                .build(),
        )
        .build()
        .unwrap();

    let err = engine
        .translate_output("a", &crate::common::local_input(EntityId(1)))
        .unwrap_err();
    let EngineError::Translation(TranslationError::ActionInvocation { source, .. }) = err else {
        panic!("expected an action failure");
    };
    // the cycle surfaces from the innermost include
    let ActionError::Nested(inner) = source else {
        panic!("expected a nested failure");
    };
    assert!(matches!(
        *inner,
        TranslationError::ActionInvocation {
            source: ActionError::IncludeCycle { ref chain },
            ..
        } if chain == &vec!["a".to_string(), "b".to_string(), "a".to_string()]
    ));
}

#[test]
fn test_profile_survives_a_string_round_trip() {
    let registry = ActionRegistry::with_builtin_actions();
    let profile =
        InputTranslationProfile::from_json(&fixtures::sso_profile("UPDATE_AND_REMOVE_MISSING"), &registry)
            .unwrap();

    let text = profile.to_json_string().unwrap();
    let reloaded = InputTranslationProfile::from_json_str(&text, &registry).unwrap();

    assert_eq!(reloaded, profile);
    assert_eq!(reloaded.description(), "Single sign-on users");
    assert_eq!(reloaded.rules().len(), 3);
}

#[test]
fn test_engine_accepts_documents_without_version_or_direction() {
    let engine = TranslationEngineBuilder::new()
        .with_profile_json(json!({
            "name": "mail",
            "description": "Mail from the IdP",
            "mode": "UPDATE_AND_REMOVE_MISSING",
            "rules": [{
                "condition": {"conditionValue": "attr['email'] != null"},
                "action": {"name": "mapAttribute", "parameters": ["mail", "/", "attr['email']"]}
            }]
        }))
        .with_profile_json(json!({
            "name": "release",
            "rules": [{
                "condition": {"conditionValue": "true"},
                "action": {"name": "createAttribute", "parameters": ["displayName", "attr['cn']"]}
            }]
        }))
        .build()
        .unwrap();

    let mail = engine.input_profile("mail").unwrap();
    assert_eq!(mail.mode(), ProfileMode::UpdateAndRemoveMissing);
    let mapped = engine
        .translate_input("mail", &remote_input("joe", Some("joe@example.com")))
        .unwrap();
    assert_eq!(mapped.attributes[0].attribute.values, vec!["joe@example.com"]);

    let released = engine
        .translate_output("release", &crate::common::local_input(EntityId(1)))
        .unwrap();
    assert_eq!(released.attribute("displayName").unwrap().attribute.values, vec!["Joe Doe"]);
}

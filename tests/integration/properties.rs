//! Property-Based Testing for translation profiles and results
//!
//! Uses proptest to check that rules run in declaration order, that false
//! conditions never reach their action, that a break keeps exactly the
//! effects of the rules before it, that profiles survive a JSON round-trip,
//! and that result accumulation and removal behave as documented.

use crate::common::{ProfileBuilder, fixtures, remote_input, spy_registry};
use identity_translation::action::{ActionDescriptor, ActionRegistry};
use identity_translation::apply::InMemoryEntityStore;
use identity_translation::engine::TranslationEngineBuilder;
use identity_translation::model::{Attribute, RemotelyAuthenticatedInput};
use identity_translation::profile::{InputTranslationProfile, ProfileMode};
use identity_translation::result::{
    AttributeEffectMode, DynamicAttribute, MappedAttribute, MappingResult, ResultScope,
    TranslationResult,
};
use proptest::prelude::*;
use regex::Regex;
use std::collections::BTreeSet;

/// One generated spy rule
#[derive(Debug, Clone)]
struct SpyRule {
    label: String,
    enabled: bool,
    breaks: bool,
}

prop_compose! {
    fn spy_rules_strategy()
        (flags in prop::collection::vec((any::<bool>(), prop::bool::weighted(0.15)), 0..12))
        -> Vec<SpyRule> {
        flags
            .into_iter()
            .enumerate()
            .map(|(i, (enabled, breaks))| SpyRule {
                label: format!("rule{}", i),
                enabled,
                breaks,
            })
            .collect()
    }
}

fn spy_profile(rules: &[SpyRule]) -> serde_json::Value {
    rules
        .iter()
        .fold(ProfileBuilder::input("spies"), |builder, rule| {
            let condition = if rule.enabled { "true" } else { "false" };
            if rule.breaks {
                builder.rule(condition, "spy", &[rule.label.as_str(), "BREAK"])
            } else {
                builder.rule(condition, "spy", &[rule.label.as_str()])
            }
        })
        .build()
}

/// Labels the profile should invoke: enabled rules up to and including the
/// first enabled break.
fn expected_calls(rules: &[SpyRule]) -> Vec<String> {
    let mut calls = Vec::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        calls.push(rule.label.clone());
        if rule.breaks {
            break;
        }
    }
    calls
}

/// Valid built-in input actions with their parameters
fn input_action_strategy() -> impl Strategy<Value = (&'static str, Vec<&'static str>)> {
    prop::sample::select(vec![
        ("mapIdentity", vec!["userName", "id"]),
        ("mapIdentity", vec!["email", "attr['mail']", "", "MATCH"]),
        ("mapAttribute", vec!["mail", "/", "attr['email']", "UPDATE_ONLY"]),
        ("mapAttribute", vec!["cn", "/staff", "attrs['cn']"]),
        ("mapGroup", vec!["'/staff'", "ADD_IF_GROUP_EXISTS"]),
        ("multiMapAttribute", vec!["cn:fullName:/\nsn:surname:/"]),
        ("entityChange", vec!["DISABLE", "5"]),
        ("entityChange", vec!["CLEAR"]),
        ("removeStaleData", vec![]),
        ("breakInputRules", vec![]),
    ])
}

fn condition_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "true",
        "attr['email'] != null",
        "idp == 'https://idp.example.org' && groups.contains('staff')",
        "attrs['cn'].size() > 1",
    ])
}

prop_compose! {
    fn mapping_result_strategy()
        (names in prop::collection::vec("[a-e]{1,3}", 0..5),
         clean in any::<bool>())
        -> MappingResult {
        let mut result = MappingResult::new();
        for name in names {
            result.add_attribute(MappedAttribute {
                mode: AttributeEffectMode::CreateOrUpdate,
                attribute: Attribute::new(&name, "/", [name.as_str()]),
            });
        }
        if clean {
            result.clean_stale_data();
        }
        result
    }
}

fn merged(mut first: MappingResult, rest: &[&MappingResult]) -> MappingResult {
    for other in rest {
        first.merge_with((*other).clone());
    }
    first
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rules_run_in_order_and_stop_at_break(rules in spy_rules_strategy()) {
        let (registry, log) = spy_registry();
        let profile = InputTranslationProfile::from_json(&spy_profile(&rules), &registry).unwrap();

        let result = profile.translate(&RemotelyAuthenticatedInput::new("idp")).unwrap();

        let expected = expected_calls(&rules);
        prop_assert_eq!(log.calls(), expected.clone());
        let produced: Vec<String> = result
            .attributes
            .iter()
            .map(|a| a.attribute.name.clone())
            .collect();
        prop_assert_eq!(produced, expected);
    }

    #[test]
    fn prop_false_conditions_never_invoke(count in 0usize..10) {
        let (registry, log) = spy_registry();
        let rules: Vec<SpyRule> = (0..count)
            .map(|i| SpyRule { label: format!("r{}", i), enabled: false, breaks: i % 2 == 0 })
            .collect();
        let profile = InputTranslationProfile::from_json(&spy_profile(&rules), &registry).unwrap();

        let result = profile.translate(&RemotelyAuthenticatedInput::new("idp")).unwrap();

        prop_assert!(log.calls().is_empty());
        prop_assert!(result.is_empty());
    }

    #[test]
    fn prop_profile_json_round_trip(
        rules in prop::collection::vec((condition_strategy(), input_action_strategy()), 0..8),
        remove_missing in any::<bool>(),
    ) {
        let registry = ActionRegistry::with_builtin_actions();
        let mode = if remove_missing { "UPDATE_AND_REMOVE_MISSING" } else { "UPDATE_ONLY" };
        let document = rules
            .iter()
            .fold(ProfileBuilder::input("generated").with_mode(mode), |builder, (condition, (action, params))| {
                builder.rule(condition, action, params)
            })
            .build();
        let profile = InputTranslationProfile::from_json(&document, &registry).unwrap();

        let reloaded = InputTranslationProfile::from_json(&profile.to_json(), &registry).unwrap();

        prop_assert_eq!(&reloaded, &profile);
        prop_assert_eq!(
            reloaded.mode(),
            if remove_missing { ProfileMode::UpdateAndRemoveMissing } else { ProfileMode::UpdateOnly }
        );
        let actions: Vec<&str> = reloaded.rules().iter().map(|r| r.action().name()).collect();
        let expected: Vec<&str> = rules.iter().map(|(_, (action, _))| *action).collect();
        prop_assert_eq!(actions, expected);
    }

    #[test]
    fn prop_merge_is_associative(
        a in mapping_result_strategy(),
        b in mapping_result_strategy(),
        c in mapping_result_strategy(),
    ) {
        let left = merged(merged(a.clone(), &[&b]), &[&c]);
        let right = merged(a.clone(), &[&merged(b.clone(), &[&c])]);
        prop_assert_eq!(&left, &right);
        prop_assert_eq!(
            left.attributes.len(),
            a.attributes.len() + b.attributes.len() + c.attributes.len()
        );
    }

    #[test]
    fn prop_remove_by_match_removes_exactly_the_matches(
        names in prop::collection::btree_set("[a-c]{1,4}", 0..10),
        prefix in "[a-c]",
    ) {
        let mut result = TranslationResult::new();
        for name in &names {
            result.add_attribute(DynamicAttribute::new(Attribute::new(name, "/", ["v"])));
        }
        let pattern = Regex::new(&format!("^(?:{}.*)$", prefix)).unwrap();

        let removed = result.remove_attributes_matching(ResultScope::Exposed, &pattern);

        let expected: BTreeSet<String> = names
            .iter()
            .filter(|n| n.starts_with(prefix.as_str()))
            .cloned()
            .collect();
        prop_assert_eq!(removed, expected);
        let remaining: Vec<String> = result.attributes().iter().map(|a| a.name().to_string()).collect();
        let untouched: Vec<String> = names
            .iter()
            .filter(|n| !n.starts_with(prefix.as_str()))
            .cloned()
            .collect();
        prop_assert_eq!(remaining, untouched);
    }

    #[test]
    fn prop_repeated_logins_reuse_one_entity_per_user(
        users in prop::collection::vec("[a-f]{1,3}", 1..6),
    ) {
        tokio_test::block_on(async {
            let engine = TranslationEngineBuilder::new()
                .with_profile_json(fixtures::sso_profile("UPDATE_ONLY"))
                .build()
                .unwrap();
            let store = InMemoryEntityStore::new();

            for user in users.iter().chain(users.iter()) {
                engine
                    .process_input("sso", &remote_input(user, None), &store)
                    .await
                    .unwrap();
            }

            let distinct: BTreeSet<&String> = users.iter().collect();
            assert_eq!(store.entity_count().await, distinct.len());
        });
    }
}

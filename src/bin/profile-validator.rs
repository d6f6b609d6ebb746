//! # Translation Profile Validator
//!
//! A command-line utility that checks translation profile files load
//! against the built-in action registry.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin profile-validator profiles/ldap-in.json
//! cargo run --bin profile-validator ./profiles/
//! ```
//!
//! ## Output Examples
//!
//! ```text
//! Validating profile file: profiles/ldap-in.json
//! ✓ Profile is valid!
//!
//! Profile Summary:
//!   Name: ldap-in
//!   Direction: input
//!   Mode: UPDATE_ONLY
//!   Rules: 3
//!   Actions used:
//!     - mapAttribute: 2
//!     - mapIdentity: 1
//! ```
//!
//! ```text
//! Validating profile file: broken.json
//! ❌ Profile validation failed: Rule 2 of profile 'broken': Translation action 'mapAtribute' is not registered
//! ```
//!
//! Every file is checked on its own first. For a directory the files are
//! then loaded together, which also catches duplicate profile names.
//!
//! ## Exit Codes
//!
//! - `0`: All profiles are valid
//! - `1`: One or more profiles are invalid or validation error occurred

use identity_translation::action::ActionRegistry;
use identity_translation::profile::{
    InputTranslationProfile, OutputTranslationProfile, ProfileDefinition, ProfileDirection,
    ProfileRepository,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <profile-file-or-directory>", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} profiles/ldap-in.json", args[0]);
        eprintln!("  {} ./profiles/", args[0]);
        process::exit(1);
    }

    let registry = ActionRegistry::with_builtin_actions();
    let path = Path::new(&args[1]);

    if path.is_file() {
        validate_single_file(path, &registry);
    } else if path.is_dir() {
        validate_directory(path, &registry);
    } else {
        eprintln!(
            "Error: '{}' is not a valid file or directory",
            path.display()
        );
        process::exit(1);
    }
}

fn validate_single_file(file_path: &Path, registry: &ActionRegistry) {
    println!("Validating profile file: {}", file_path.display());

    match load_and_validate_profile(file_path, registry) {
        Ok(profile) => {
            println!("✓ Profile is valid!");
            print_profile_summary(&profile);
        }
        Err(e) => {
            eprintln!("❌ Profile validation failed: {}", e);
            process::exit(1);
        }
    }
}

fn validate_directory(dir_path: &Path, registry: &ActionRegistry) {
    println!("Validating profiles in directory: {}", dir_path.display());

    let mut valid_count = 0;
    let mut error_count = 0;

    let mut files: Vec<_> = match fs::read_dir(dir_path) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect(),
        Err(e) => {
            eprintln!("Error reading directory: {}", e);
            process::exit(1);
        }
    };
    files.sort();

    for path in &files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("\nValidating: {}", file_name);

        match load_and_validate_profile(path, registry) {
            Ok(profile) => {
                println!(
                    "  ✓ Valid - {} ({}, {} rules)",
                    profile.definition.name,
                    profile.direction,
                    profile.definition.rules.len()
                );
                valid_count += 1;
            }
            Err(e) => {
                eprintln!("  ❌ Invalid - {}", e);
                error_count += 1;
            }
        }
    }

    println!("\nValidation Summary:");
    println!("  Valid profiles: {}", valid_count);
    println!("  Invalid profiles: {}", error_count);

    if error_count > 0 {
        process::exit(1);
    }

    println!("\nTesting profile repository loading...");
    match ProfileRepository::from_profile_dir(dir_path, registry) {
        Ok(repository) => {
            println!("✓ Profile repository loaded successfully");
            println!("  Total profiles loaded: {}", repository.len());
            for direction in [ProfileDirection::Input, ProfileDirection::Output] {
                for name in repository.names(direction) {
                    println!("    - {} ({})", name, direction);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to load profile repository: {}", e);
            process::exit(1);
        }
    }
}

/// A profile file that loaded cleanly.
struct ValidatedProfile {
    definition: ProfileDefinition,
    direction: ProfileDirection,
    legacy: bool,
}

fn load_and_validate_profile(
    file_path: &Path,
    registry: &ActionRegistry,
) -> Result<ValidatedProfile, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file_path)?;
    let document: Value = serde_json::from_str(&content)?;
    let definition = ProfileDefinition::from_json(&document)?;

    if definition.name.trim().is_empty() {
        return Err("Profile name cannot be empty".into());
    }

    // Instantiating resolves every action and checks its parameters.
    let direction = definition.resolve_direction(registry);
    match direction {
        ProfileDirection::Input => {
            InputTranslationProfile::from_definition(&definition, registry)?;
        }
        ProfileDirection::Output => {
            OutputTranslationProfile::from_definition(&definition, registry)?;
        }
    }

    Ok(ValidatedProfile {
        legacy: ProfileDefinition::is_legacy(&document),
        definition,
        direction,
    })
}

fn print_profile_summary(profile: &ValidatedProfile) {
    let definition = &profile.definition;
    println!();
    println!("Profile Summary:");
    println!("  Name: {}", definition.name);
    if !definition.description.is_empty() {
        println!("  Description: {}", definition.description);
    }
    println!("  Direction: {}", profile.direction);
    if profile.direction == ProfileDirection::Input {
        println!("  Mode: {}", definition.mode.unwrap_or_default());
    }
    if profile.legacy {
        println!("  Format: legacy (converted on load)");
    }
    println!("  Rules: {}", definition.rules.len());

    let mut action_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for rule in &definition.rules {
        *action_counts.entry(rule.action.name.as_str()).or_insert(0) += 1;
    }
    if !action_counts.is_empty() {
        println!("  Actions used:");
        for (action, count) in action_counts {
            println!("    - {}: {}", action, count);
        }
    }
}

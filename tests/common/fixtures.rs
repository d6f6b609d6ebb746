//! Profile documents shared by several tests.

use super::ProfileBuilder;
use serde_json::Value;

/// One rule: map `email` to `mail` when the IdP asserted it.
pub fn mail_profile() -> Value {
    ProfileBuilder::input("mail")
        .rule(
            "attr['email'] != null",
            "mapAttribute",
            &["mail", "/", "attr['email']"],
        )
        .build()
}

/// Maps the user name, the email and the IdP groups under `/remote`.
pub fn sso_profile(mode: &str) -> Value {
    ProfileBuilder::input("sso")
        .with_description("Single sign-on users")
        .with_mode(mode)
        .always("mapIdentity", &["userName", "idsByType['userName']"])
        .rule(
            "attr['email'] != null",
            "mapAttribute",
            &["mail", "/", "attr['email']"],
        )
        .always(
            "mapGroup",
            &["groups.size() > 0 ? '/remote/' + groups[0] : null", "CREATE_GROUP_IF_MISSING"],
        )
        .build()
}

/// Releases a filtered attribute set and persists a marker attribute.
pub fn release_profile() -> Value {
    ProfileBuilder::output("release")
        .always("createAttribute", &["displayName", "attr['cn']"])
        .always("createPersistentAttribute", &["lastRelease", "requester"])
        .always("createPersistentIdentity", &["targeted", "'tid-' + requester.length()"])
        .always("filterAttribute", &["c.*"])
        .rule("protocol == 'OIDC'", "redirect", &["'https://consent.example.org'"])
        .build()
}

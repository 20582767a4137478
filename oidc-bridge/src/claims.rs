use crate::provider::UpstreamProfile;
use serde_json::{Map, Value};

/// Namespaced claim name, e.g. `https://bridge.example/claims/username`.
pub fn claim_name(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Project a third-party profile onto OIDC userinfo claims.
///
/// `name` falls back to the username. Fields with no OIDC equivalent go
/// under `namespace`. The third party has no verified email, so none is
/// emitted.
pub fn userinfo_claims(profile: &UpstreamProfile, namespace: &str) -> Map<String, Value> {
    let mut claims = Map::new();

    claims.insert("sub".into(), Value::String(profile.id.clone()));
    claims.insert(
        "name".into(),
        Value::String(
            profile
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| profile.username.clone()),
        ),
    );
    claims.insert(
        "preferred_username".into(),
        Value::String(profile.username.clone()),
    );
    if let Some(picture) = &profile.profile_picture_url {
        claims.insert("picture".into(), Value::String(picture.clone()));
    }

    claims.insert(
        claim_name(namespace, "account_type"),
        Value::String(profile.account_type.clone()),
    );
    claims.insert(
        claim_name(namespace, "user_id"),
        Value::String(profile.id.clone()),
    );

    claims
}

/// Every claim name the bridge can emit, for discovery.
pub fn supported_claims(namespace: &str) -> Vec<String> {
    let mut claims: Vec<String> = ["sub", "iss", "aud", "exp", "iat", "name", "preferred_username", "picture"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    claims.extend(
        ["username", "account_type", "user_id"]
            .iter()
            .map(|c| claim_name(namespace, c)),
    );
    claims
}

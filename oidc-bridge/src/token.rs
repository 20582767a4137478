use crate::claims::claim_name;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::provider::UpstreamProfile;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// An OIDC-shaped ID token with an empty signature segment.
///
/// The bridge holds no signing key. This token is only ever returned from
/// the token endpoint, which the broker calls server-to-server with the
/// client secret; it must never be handed to a browser or any other party
/// that would try to verify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedIdToken(String);

impl UnsignedIdToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Registered claims of a synthesized ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    pub jti: String,
    pub preferred_username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Namespaced extension claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Builds the unsigned ID tokens handed to the broker.
pub struct IdTokenIssuer {
    claim_namespace: String,
    ttl_seconds: i64,
}

impl IdTokenIssuer {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            claim_namespace: config.claim_namespace.clone(),
            ttl_seconds: config.token_ttl_seconds,
        }
    }

    /// Synthesize `header.payload.` for a profile.
    pub fn issue(&self, issuer: &str, audience: &str, profile: &UpstreamProfile) -> Result<UnsignedIdToken> {
        let now = Utc::now().timestamp();

        let mut extra = Map::new();
        extra.insert(
            claim_name(&self.claim_namespace, "username"),
            Value::String(profile.username.clone()),
        );
        extra.insert(
            claim_name(&self.claim_namespace, "account_type"),
            Value::String(profile.account_type.clone()),
        );

        let claims = IdTokenClaims {
            iss: issuer.to_string(),
            sub: profile.id.clone(),
            aud: audience.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
            auth_time: now,
            jti: generate_random_string(24),
            preferred_username: profile.username.clone(),
            name: profile
                .display_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| profile.username.clone()),
            picture: profile.profile_picture_url.clone(),
            extra,
        };

        let header = json!({ "alg": "none", "typ": "JWT" });

        let header_json = serde_json::to_string(&header)
            .map_err(|e| Error::Internal(format!("failed to serialize header: {}", e)))?;
        let claims_json = serde_json::to_string(&claims)
            .map_err(|e| Error::Internal(format!("failed to serialize claims: {}", e)))?;

        let header_b64 = URL_SAFE_NO_PAD.encode(header_json);
        let payload_b64 = URL_SAFE_NO_PAD.encode(claims_json);

        Ok(UnsignedIdToken(format!("{}.{}.", header_b64, payload_b64)))
    }
}

/// Read the claims back out of an unsigned ID token.
///
/// Performs no verification.
pub fn decode_unverified(token: &str) -> Result<IdTokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidRequest("invalid token format".to_string()));
    }

    let payload_json = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| Error::InvalidRequest(format!("invalid payload encoding: {}", e)))?;

    serde_json::from_slice(&payload_json)
        .map_err(|e| Error::InvalidRequest(format!("invalid claims: {}", e)))
}

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
fn generate_random_string(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

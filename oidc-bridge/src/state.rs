//! The state envelope carried through the third party's `state` parameter.
//!
//! The bridge keeps no sessions. Everything it needs to finish a flow (the
//! broker's own state, where to send the browser back to, whether the user
//! is on a mobile device) travels in this envelope as URL-safe base64 JSON.
//! It carries routing metadata only, no secrets, so it is not signed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEnvelope {
    /// The broker's own `state`, returned to it untouched
    pub original_state: String,
    /// Older envelopes only carried `originalState`
    #[serde(default)]
    pub broker_redirect_uri: String,
    #[serde(default)]
    pub is_mobile: bool,
}

/// Where the callback sends the user once the third party returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackTarget {
    /// Hand the code back to the broker
    Forward { redirect_uri: String },
    /// Exchange the code here and land on the app's success page
    Direct,
}

impl StateEnvelope {
    pub fn new(
        original_state: impl Into<String>,
        broker_redirect_uri: impl Into<String>,
        is_mobile: bool,
    ) -> Self {
        Self {
            original_state: original_state.into(),
            broker_redirect_uri: broker_redirect_uri.into(),
            is_mobile,
        }
    }

    /// Serialize to the opaque string sent as `state`.
    pub fn encode(&self) -> String {
        // a struct of strings and a bool always serializes
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a `state` value. Never fails: anything that is not an envelope
    /// becomes the legacy shape with the raw string as the original state.
    pub fn decode(raw: &str) -> Self {
        match Self::try_decode(raw) {
            Some(envelope) => envelope,
            None => {
                tracing::warn!(
                    stage = "callback",
                    state_len = raw.len(),
                    "state is not an envelope, treating as legacy state"
                );
                Self {
                    original_state: raw.to_string(),
                    broker_redirect_uri: String::new(),
                    is_mobile: false,
                }
            }
        }
    }

    fn try_decode(raw: &str) -> Option<Self> {
        // tolerate padded standard base64 from older encoders
        let trimmed = raw.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(trimmed))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn target(&self) -> CallbackTarget {
        let redirect_uri = self.broker_redirect_uri.trim();
        if redirect_uri.is_empty() {
            CallbackTarget::Direct
        } else {
            CallbackTarget::Forward {
                redirect_uri: redirect_uri.to_string(),
            }
        }
    }
}

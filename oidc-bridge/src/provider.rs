use crate::config::BridgeConfig;
use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use url::Url;

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Result of exchanging an authorization code with the third party.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamToken {
    pub access_token: String,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
}

/// Profile of the authenticated third-party user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub account_type: String,
    #[serde(default, rename = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// The third-party OAuth2 provider.
///
/// Implementations must not retry: codes are single-use.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Exchange an authorization code. `redirect_uri` must equal the one sent
    /// on the authorize redirect.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> UpstreamResult<UpstreamToken>;

    /// Fetch the profile belonging to an access token
    async fn fetch_profile(&self, access_token: &str) -> UpstreamResult<UpstreamProfile>;
}

/// [`UpstreamProvider`] speaking the third party's HTTP API.
#[derive(Clone)]
pub struct HttpProvider {
    http_client: Client,
    client_id: String,
    client_secret: String,
    token_url: Url,
    profile_url: Url,
}

const PROFILE_FIELDS: &str = "id,username,account_type,name,profile_picture_url";

impl HttpProvider {
    pub fn new(config: &BridgeConfig) -> UpstreamResult<Self> {
        Self::with_timeout(config, config.http_timeout)
    }

    pub fn with_timeout(config: &BridgeConfig, timeout: Duration) -> UpstreamResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
            profile_url: config.profile_url.clone(),
        })
    }
}

#[async_trait]
impl UpstreamProvider for HttpProvider {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> UpstreamResult<UpstreamToken> {
        tracing::debug!(stage = "exchange", "exchanging authorization code upstream");

        let response = self
            .http_client
            .post(self.token_url.clone())
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(stage = "exchange", %status, "upstream rejected code exchange");
            return Err(UpstreamError::Status {
                status: status.to_string(),
            });
        }

        response.json::<UpstreamToken>().await.map_err(|e| {
            tracing::error!(stage = "exchange", error = %e.without_url(), "unreadable token response");
            UpstreamError::Malformed
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> UpstreamResult<UpstreamProfile> {
        tracing::debug!(stage = "profile", "fetching upstream profile");

        let response = self
            .http_client
            .get(self.profile_url.clone())
            .query(&[("fields", PROFILE_FIELDS)])
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(stage = "profile", %status, "upstream rejected profile fetch");
            return Err(UpstreamError::Status {
                status: status.to_string(),
            });
        }

        response.json::<UpstreamProfile>().await.map_err(|e| {
            tracing::error!(stage = "profile", error = %e.without_url(), "unreadable profile response");
            UpstreamError::Malformed
        })
    }
}

// The third party sends numeric ids as JSON numbers in some responses.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

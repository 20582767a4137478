use async_trait::async_trait;
use oidc_bridge::{
    UpstreamError, UpstreamProfile, UpstreamProvider, UpstreamToken,
    provider::UpstreamResult,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Stand-in third party: every code is valid once and belongs to the demo user.
#[derive(Clone)]
pub struct MemoryProvider {
    profile: UpstreamProfile,
    used_codes: Arc<RwLock<HashMap<String, String>>>, // code -> access token
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            profile: UpstreamProfile {
                id: "17841400000000000".to_string(),
                username: "demo_dj".to_string(),
                account_type: "CREATOR".to_string(),
                display_name: Some("Demo DJ".to_string()),
                profile_picture_url: None,
            },
            used_codes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl UpstreamProvider for MemoryProvider {
    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> UpstreamResult<UpstreamToken> {
        let mut used = self.used_codes.write().unwrap();
        if used.contains_key(code) {
            return Err(UpstreamError::Status {
                status: "400 Bad Request".to_string(),
            });
        }

        let access_token = format!("demo-token-{}", used.len() + 1);
        used.insert(code.to_string(), access_token.clone());

        Ok(UpstreamToken {
            access_token,
            user_id: self.profile.id.clone(),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> UpstreamResult<UpstreamProfile> {
        let known = self
            .used_codes
            .read()
            .unwrap()
            .values()
            .any(|t| t == access_token);

        if known {
            Ok(self.profile.clone())
        } else {
            Err(UpstreamError::Status {
                status: "401 Unauthorized".to_string(),
            })
        }
    }
}

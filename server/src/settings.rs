use anyhow::{Context, Result, bail};
use oidc_bridge::BridgeConfig;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Everything the binary reads from the environment.
#[derive(Debug)]
pub struct Settings {
    pub bind_address: SocketAddr,
    pub bridge: BridgeConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| {
            var(key).with_context(|| format!("{} environment variable required", key))
        };
        let parse_url = |key: &'static str, value: String| {
            Url::parse(&value).with_context(|| format!("{} is not a valid URL", key))
        };

        let bind_address = var("BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDRESS is not a socket address")?;

        let client_id = required("BRIDGE_CLIENT_ID")?;
        let client_secret = required("BRIDGE_CLIENT_SECRET")?;
        let app_base_url = parse_url("BRIDGE_APP_BASE_URL", required("BRIDGE_APP_BASE_URL")?)?;
        let public_url = parse_url(
            "BRIDGE_PUBLIC_URL",
            var("BRIDGE_PUBLIC_URL").unwrap_or_else(|| "http://127.0.0.1:3000".to_string()),
        )?;

        let mut bridge = BridgeConfig::new(public_url, client_id, client_secret, app_base_url);

        let endpoints = (
            var("BRIDGE_AUTHORIZE_URL"),
            var("BRIDGE_TOKEN_URL"),
            var("BRIDGE_PROFILE_URL"),
        );
        bridge = match endpoints {
            (None, None, None) => bridge,
            (Some(authorize), Some(token), Some(profile)) => bridge.with_endpoints(
                parse_url("BRIDGE_AUTHORIZE_URL", authorize)?,
                parse_url("BRIDGE_TOKEN_URL", token)?,
                parse_url("BRIDGE_PROFILE_URL", profile)?,
            ),
            _ => bail!(
                "BRIDGE_AUTHORIZE_URL, BRIDGE_TOKEN_URL and BRIDGE_PROFILE_URL must be set together"
            ),
        };

        if let Some(scopes) = var("BRIDGE_SCOPES") {
            bridge = bridge.with_scopes(split_list(&scopes));
        }
        if let Some(path) = var("BRIDGE_SUCCESS_PATH") {
            bridge = bridge.with_success_path(path);
        }
        if let Some(namespace) = var("BRIDGE_CLAIM_NAMESPACE") {
            bridge = bridge.with_claim_namespace(namespace);
        }
        if let Some(origins) = var("BRIDGE_CORS_ORIGINS") {
            bridge = bridge.with_cors_origins(split_list(&origins));
        }
        if let Some(origins) = var("BRIDGE_ALLOWED_REDIRECT_ORIGINS") {
            bridge = bridge.with_allowed_redirect_origins(split_list(&origins));
        }
        if let Some(flag) = var("BRIDGE_REQUIRE_CLIENT_AUTH") {
            bridge = bridge.with_client_auth(parse_flag("BRIDGE_REQUIRE_CLIENT_AUTH", &flag)?);
        }
        if let Some(ttl) = var("BRIDGE_TOKEN_TTL_SECS") {
            let ttl: i64 = ttl.parse().context("BRIDGE_TOKEN_TTL_SECS is not a number")?;
            bridge = bridge.with_token_ttl(ttl);
        }
        if let Some(timeout) = var("BRIDGE_HTTP_TIMEOUT_SECS") {
            let secs: u64 = timeout
                .parse()
                .context("BRIDGE_HTTP_TIMEOUT_SECS is not a number")?;
            bridge = bridge.with_http_timeout(Duration::from_secs(secs));
        }

        bridge.validate()?;

        Ok(Self {
            bind_address,
            bridge,
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be true or false, got {:?}", key, other),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("BRIDGE_CLIENT_ID", "ig-client"),
        ("BRIDGE_CLIENT_SECRET", "ig-secret"),
        ("BRIDGE_APP_BASE_URL", "https://app.example"),
    ];

    #[test]
    fn minimal_environment_uses_defaults() {
        let settings = load(MINIMAL).unwrap();
        assert_eq!(settings.bind_address.port(), 3000);
        assert_eq!(settings.bridge.client_id, "ig-client");
        assert_eq!(settings.bridge.scopes, vec!["user_profile".to_string()]);
        assert!(settings.bridge.require_client_auth);
        assert!(settings.bridge.allowed_redirect_origins.is_empty());
        assert_eq!(
            settings.bridge.callback_url(),
            "http://127.0.0.1:3000/oauth/callback"
        );
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = load(&MINIMAL[..1]).unwrap_err();
        assert!(err.to_string().contains("BRIDGE_CLIENT_SECRET"));

        let mut vars = MINIMAL.to_vec();
        vars[1] = ("BRIDGE_CLIENT_SECRET", "   ");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn partial_endpoint_override_is_rejected() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("BRIDGE_TOKEN_URL", "https://provider.example/token"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn unknown_client_auth_flag_is_rejected() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("BRIDGE_REQUIRE_CLIENT_AUTH", "maybe"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("BRIDGE_REQUIRE_CLIENT_AUTH"));
    }

    #[test]
    fn lists_and_overrides_are_parsed() {
        let mut vars = MINIMAL.to_vec();
        vars.extend([
            ("BRIDGE_PUBLIC_URL", "https://bridge.example"),
            ("BRIDGE_SCOPES", "user_profile, user_media"),
            ("BRIDGE_CORS_ORIGINS", "https://auth.broker.example,"),
            ("BRIDGE_TOKEN_TTL_SECS", "900"),
            ("BRIDGE_HTTP_TIMEOUT_SECS", "2"),
            ("BRIDGE_REQUIRE_CLIENT_AUTH", "false"),
            (
                "BRIDGE_ALLOWED_REDIRECT_ORIGINS",
                "https://auth.broker.example, http://localhost:8080",
            ),
        ]);

        let settings = load(&vars).unwrap();
        assert_eq!(settings.bridge.scopes, vec!["user_profile", "user_media"]);
        assert_eq!(settings.bridge.cors_origins, vec!["https://auth.broker.example"]);
        assert_eq!(settings.bridge.token_ttl_seconds, 900);
        assert_eq!(settings.bridge.http_timeout, Duration::from_secs(2));
        assert!(!settings.bridge.require_client_auth);
        assert_eq!(
            settings.bridge.allowed_redirect_origins,
            vec!["https://auth.broker.example", "http://localhost:8080"]
        );
        assert_eq!(settings.bridge.claim_namespace, "https://bridge.example/claims");
    }
}

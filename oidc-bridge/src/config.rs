use crate::error::ConfigError;
use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_AUTHORIZE_URL: &str = "https://api.instagram.com/oauth/authorize";
const DEFAULT_TOKEN_URL: &str = "https://api.instagram.com/oauth/access_token";
const DEFAULT_PROFILE_URL: &str = "https://graph.instagram.com/me";

/// Configuration for the bridge, assembled once at startup.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Public address of this proxy. Used for the fixed callback URL and as
    /// the issuer when the request origin cannot be determined.
    pub public_url: Url,

    /// Third-party OAuth client id
    pub client_id: String,

    /// Third-party OAuth client secret
    pub client_secret: String,

    /// Third-party endpoints
    pub authorize_url: Url,
    pub token_url: Url,
    pub profile_url: Url,

    /// Scopes requested from the third party
    pub scopes: Vec<String>,

    /// Extra authorize parameters sent to mobile user agents so the third
    /// party renders a web page instead of handing off to its native app
    pub mobile_params: Vec<(String, String)>,

    /// Base URL of the downstream app (direct-path success page lives here)
    pub app_base_url: Url,

    /// Path of the success page under `app_base_url`
    pub success_path: String,

    /// Namespace prefix for claims that have no OIDC equivalent
    pub claim_namespace: String,

    /// Broker origins allowed through CORS, in addition to localhost
    pub cors_origins: Vec<String>,

    /// Origins the broker may ask us to send codes back to. A
    /// `redirect_uri` on any other origin is refused.
    pub allowed_redirect_origins: Vec<String>,

    /// Broker credentials checked on the token endpoint (default: on)
    pub require_client_auth: bool,

    /// `expires_in` of issued tokens and lifetime of the id token (default: 3600)
    pub token_ttl_seconds: i64,

    /// Timeout for each outbound call to the third party (default: 5s)
    pub http_timeout: Duration,
}

impl BridgeConfig {
    /// Create a new configuration with the Instagram-style defaults.
    pub fn new(
        public_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        app_base_url: Url,
    ) -> Self {
        let claim_namespace = format!("{}/claims", public_url.as_str().trim_end_matches('/'));

        Self {
            public_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL).expect("valid url"),
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("valid url"),
            profile_url: Url::parse(DEFAULT_PROFILE_URL).expect("valid url"),
            scopes: vec!["user_profile".to_string()],
            mobile_params: vec![
                ("display".to_string(), "web".to_string()),
                ("platform".to_string(), "web".to_string()),
            ],
            app_base_url,
            success_path: "/auth/success".to_string(),
            claim_namespace,
            cors_origins: Vec::new(),
            allowed_redirect_origins: Vec::new(),
            require_client_auth: true,
            token_ttl_seconds: 3600,
            http_timeout: Duration::from_secs(5),
        }
    }

    /// The proxy's own callback. Sent to the third party both when
    /// authorizing and when exchanging the code, and must be identical in
    /// both places.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/oauth/callback",
            self.public_url.as_str().trim_end_matches('/')
        )
    }

    /// Where the direct path sends the browser after a successful exchange:
    /// `success_path` appended under `app_base_url`, keeping any path prefix.
    pub fn success_url(&self) -> Result<Url, ConfigError> {
        let base = self.app_base_url.as_str().trim_end_matches('/');
        let path = self.success_path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path)).map_err(|source| ConfigError::InvalidUrl {
            name: "success_path",
            source,
        })
    }

    /// Reject configurations that would produce broken redirects.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("client_secret"));
        }
        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::NoScopes);
        }
        self.success_url()?;
        Ok(())
    }

    /// Set third-party endpoints
    pub fn with_endpoints(mut self, authorize_url: Url, token_url: Url, profile_url: Url) -> Self {
        self.authorize_url = authorize_url;
        self.token_url = token_url;
        self.profile_url = profile_url;
        self
    }

    /// Set custom scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the parameters appended for mobile user agents
    pub fn with_mobile_params(mut self, params: Vec<(String, String)>) -> Self {
        self.mobile_params = params;
        self
    }

    /// Set the success page path
    pub fn with_success_path(mut self, path: impl Into<String>) -> Self {
        self.success_path = path.into();
        self
    }

    /// Set the custom claim namespace
    pub fn with_claim_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.claim_namespace = namespace.into().trim_end_matches('/').to_string();
        self
    }

    /// Set allowed broker origins
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Set the origins allowed as broker `redirect_uri`
    pub fn with_allowed_redirect_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_redirect_origins = origins;
        self
    }

    /// Whether codes may be handed to this broker URL.
    pub fn is_allowed_redirect(&self, redirect_uri: &Url) -> bool {
        let origin = redirect_uri.origin();
        if !origin.is_tuple() {
            return false;
        }
        self.allowed_redirect_origins.iter().any(|allowed| {
            Url::parse(allowed.trim()).is_ok_and(|allowed| allowed.origin() == origin)
        })
    }

    /// Require the broker to present our client credentials on the token endpoint
    pub fn with_client_auth(mut self, required: bool) -> Self {
        self.require_client_auth = required;
        self
    }

    /// Set token lifetime in seconds
    pub fn with_token_ttl(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    /// Set outbound HTTP timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("public_url", &self.public_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("profile_url", &self.profile_url.as_str())
            .field("scopes", &self.scopes)
            .field("app_base_url", &self.app_base_url.as_str())
            .field("success_path", &self.success_path)
            .field("claim_namespace", &self.claim_namespace)
            .field("cors_origins", &self.cors_origins)
            .field("allowed_redirect_origins", &self.allowed_redirect_origins)
            .field("require_client_auth", &self.require_client_auth)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

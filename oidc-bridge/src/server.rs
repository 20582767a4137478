use crate::{
    claims,
    config::BridgeConfig,
    cors::cors_layer,
    device::is_mobile_user_agent,
    error::{ConfigError, Error, Result},
    provider::UpstreamProvider,
    state::{CallbackTarget, StateEnvelope},
    token::IdTokenIssuer,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// The OAuth2-to-OIDC bridge.
///
/// Speaks OIDC to the broker on one side and the third party's plain
/// OAuth2 on the other. Holds no per-user state: configuration and the
/// upstream client are shared read-only between requests.
pub struct BridgeServer<P>
where
    P: UpstreamProvider,
{
    config: Arc<BridgeConfig>,
    provider: Arc<P>,
    issuer: Arc<IdTokenIssuer>,
}

impl<P: UpstreamProvider> Clone for BridgeServer<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            provider: self.provider.clone(),
            issuer: self.issuer.clone(),
        }
    }
}

impl<P> BridgeServer<P>
where
    P: UpstreamProvider + 'static,
{
    /// Create a new bridge server builder.
    pub fn builder() -> BridgeServerBuilder<P> {
        BridgeServerBuilder::default()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Create the axum router with all endpoints and CORS applied.
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/.well-known/openid-configuration",
                get(handle_discovery::<P>),
            )
            .route("/.well-known/jwks.json", get(handle_jwks))
            .route("/oauth/authorize", get(handle_authorize::<P>))
            .route("/oauth/callback", get(handle_callback::<P>))
            .route("/oauth/token", post(handle_token::<P>))
            .route("/oauth/userinfo", get(handle_userinfo::<P>))
            .route("/health", get(handle_health))
            .layer(cors_layer(&self.config.cors_origins))
            .with_state(self.clone())
    }
}

// Handler functions

/// OIDC discovery document, pointing at this instance's own origin.
async fn handle_discovery<P>(
    State(server): State<BridgeServer<P>>,
    headers: HeaderMap,
) -> Result<Response>
where
    P: UpstreamProvider + 'static,
{
    let base_url = request_origin(&headers, &server.config.public_url);

    let metadata = serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/oauth/authorize", base_url),
        "token_endpoint": format!("{}/oauth/token", base_url),
        "userinfo_endpoint": format!("{}/oauth/userinfo", base_url),
        "jwks_uri": format!("{}/.well-known/jwks.json", base_url),
        "response_types_supported": ["code"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["RS256"],
        "scopes_supported": ["openid", "profile"],
        "claims_supported": claims::supported_claims(&server.config.claim_namespace),
        "grant_types_supported": ["authorization_code"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "client_secret_basic"],
    });

    Ok((StatusCode::OK, Json(metadata)).into_response())
}

/// Placeholder key set.
///
/// Issued ID tokens are unsigned, so nothing verifies against this. It only
/// keeps OIDC clients that insist on fetching a JWKS from failing.
async fn handle_jwks() -> Response {
    let jwks = serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": "placeholder",
            "n": "placeholder",
            "e": "AQAB"
        }]
    });

    (StatusCode::OK, Json(jwks)).into_response()
}

async fn handle_health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

/// Handle the broker's authorize request - redirect to the third party.
async fn handle_authorize<P>(
    State(server): State<BridgeServer<P>>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response>
where
    P: UpstreamProvider + 'static,
{
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_mobile = is_mobile_user_agent(user_agent);

    let broker_redirect_uri = params.redirect_uri.unwrap_or_default();
    if !broker_redirect_uri.is_empty() {
        parse_redirect_target(&server.config, &broker_redirect_uri)?;
    }

    tracing::info!(
        stage = "authorize",
        is_mobile,
        has_state = params.state.is_some(),
        has_redirect_uri = !broker_redirect_uri.is_empty(),
        "handling authorize request"
    );

    let envelope = StateEnvelope::new(
        params.state.unwrap_or_default(),
        broker_redirect_uri,
        is_mobile,
    );

    let auth_url = build_authorize_url(&server.config, &envelope);

    Ok(found(auth_url.as_str()))
}

/// Handle the third party redirecting back to us.
async fn handle_callback<P>(
    State(server): State<BridgeServer<P>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response>
where
    P: UpstreamProvider + 'static,
{
    // An error response may omit or scramble state, so don't touch it
    if let Some(error) = params.error {
        tracing::warn!(stage = "callback", error = %error, "third party returned an error");
        return Err(Error::Provider {
            error,
            description: params
                .error_description
                .map(|d| truncate(&d, MAX_DESCRIPTION_LEN))
                .unwrap_or_else(|| "authorization was not granted".to_string()),
        });
    }

    let code = params.code.filter(|c| !c.is_empty()).ok_or_else(|| {
        tracing::warn!(stage = "callback", "missing code in callback");
        Error::InvalidRequest("missing code".to_string())
    })?;

    let envelope = StateEnvelope::decode(params.state.as_deref().unwrap_or(""));

    match envelope.target() {
        CallbackTarget::Forward { redirect_uri } => {
            // The envelope is unsigned, so the target is checked again here
            let mut target = parse_redirect_target(&server.config, &redirect_uri)?;
            target
                .query_pairs_mut()
                .append_pair("code", &code)
                .append_pair("state", &envelope.original_state);

            tracing::info!(
                stage = "callback",
                path = "forward",
                is_mobile = envelope.is_mobile,
                code_fp = %fingerprint(&code),
                "forwarding code to broker"
            );

            Ok(found(target.as_str()))
        }
        CallbackTarget::Direct => {
            tracing::info!(
                stage = "callback",
                path = "direct",
                is_mobile = envelope.is_mobile,
                code_fp = %fingerprint(&code),
                "exchanging code for legacy direct flow"
            );

            let token = server
                .provider
                .exchange_code(&code, &server.config.callback_url())
                .await
                .map_err(|e| {
                    tracing::error!(stage = "callback", error = %e, "direct code exchange failed");
                    Error::InvalidGrant(format!(
                        "code exchange failed: {}",
                        e.public_description()
                    ))
                })?;

            let mut target = server
                .config
                .success_url()
                .map_err(|e| Error::Internal(e.to_string()))?;
            target
                .query_pairs_mut()
                .append_pair("access_token", &token.access_token)
                .append_pair("user_id", &token.user_id)
                .append_pair("state", &envelope.original_state);

            Ok(found(target.as_str()))
        }
    }
}

/// Handle the broker's token request: exchange the code upstream and
/// synthesize an ID token.
async fn handle_token<P>(
    State(server): State<BridgeServer<P>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response>
where
    P: UpstreamProvider + 'static,
{
    // Parse token request - form-encoded, or JSON when declared
    let params: TokenRequest = if headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
    {
        serde_json::from_str(&body)
            .map_err(|e| Error::InvalidRequest(format!("invalid JSON: {}", e)))?
    } else {
        serde_urlencoded::from_str(&body)
            .map_err(|e| Error::InvalidRequest(format!("invalid form data: {}", e)))?
    };

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            tracing::warn!(stage = "token", "missing code in token request");
            Error::InvalidRequest("missing code".to_string())
        })?;

    if let Some(grant_type) = params.grant_type.as_deref() {
        if grant_type != "authorization_code" {
            return Err(Error::UnsupportedGrantType(grant_type.to_string()));
        }
    }

    let (client_id, client_secret) = client_credentials(&headers, &params);
    if server.config.require_client_auth
        && (client_id.as_deref() != Some(server.config.client_id.as_str())
            || client_secret.as_deref() != Some(server.config.client_secret.as_str()))
    {
        tracing::warn!(stage = "token", "broker client authentication failed");
        return Err(Error::InvalidClient);
    }

    tracing::info!(
        stage = "token",
        code_fp = %fingerprint(code),
        has_client_id = client_id.is_some(),
        "handling token request"
    );

    let upstream = server
        .provider
        .exchange_code(code, &server.config.callback_url())
        .await
        .map_err(|e| {
            tracing::error!(stage = "token", error = %e, "upstream code exchange failed");
            Error::InvalidGrant(format!(
                "code exchange failed: {}",
                e.public_description()
            ))
        })?;

    let profile = server
        .provider
        .fetch_profile(&upstream.access_token)
        .await
        .map_err(|e| {
            tracing::error!(stage = "token", error = %e, "profile fetch after exchange failed");
            Error::InvalidGrant(format!(
                "profile fetch failed: {}",
                e.public_description()
            ))
        })?;

    let issuer = request_origin(&headers, &server.config.public_url);
    let audience = client_id.unwrap_or_else(|| server.config.client_id.clone());
    let id_token = server.issuer.issue(&issuer, &audience, &profile)?;

    tracing::info!(
        stage = "token",
        sub = %profile.id,
        "issued id token"
    );

    let response = TokenResponse {
        access_token: upstream.access_token,
        token_type: "Bearer".to_string(),
        expires_in: server.config.token_ttl_seconds.max(0) as u64,
        id_token: id_token.into_string(),
        scope: "openid profile".to_string(),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response())
}

/// Handle userinfo: bearer token in, OIDC claims out.
async fn handle_userinfo<P>(
    State(server): State<BridgeServer<P>>,
    headers: HeaderMap,
) -> Result<Response>
where
    P: UpstreamProvider + 'static,
{
    let access_token = bearer_token(&headers).ok_or_else(|| {
        tracing::warn!(stage = "userinfo", "missing or malformed bearer token");
        Error::InvalidToken
    })?;

    // Every upstream failure looks the same to the caller
    let profile = server
        .provider
        .fetch_profile(access_token)
        .await
        .map_err(|e| {
            tracing::warn!(stage = "userinfo", error = %e, "profile fetch failed");
            Error::InvalidToken
        })?;

    let claims = claims::userinfo_claims(&profile, &server.config.claim_namespace);
    Ok((StatusCode::OK, Json(claims)).into_response())
}

// Builder for BridgeServer.
pub struct BridgeServerBuilder<P>
where
    P: UpstreamProvider,
{
    config: Option<BridgeConfig>,
    provider: Option<Arc<P>>,
}

impl<P> Default for BridgeServerBuilder<P>
where
    P: UpstreamProvider,
{
    fn default() -> Self {
        Self {
            config: None,
            provider: None,
        }
    }
}

impl<P> BridgeServerBuilder<P>
where
    P: UpstreamProvider + 'static,
{
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn provider(mut self, provider: Arc<P>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Validates the configuration; a bridge that would emit broken
    /// redirects is never built.
    pub fn build(self) -> std::result::Result<BridgeServer<P>, ConfigError> {
        let config = self.config.ok_or(ConfigError::Missing("config"))?;
        let provider = self.provider.ok_or(ConfigError::Missing("provider"))?;

        config.validate()?;

        let issuer = Arc::new(IdTokenIssuer::new(&config));

        Ok(BridgeServer {
            config: Arc::new(config),
            provider,
            issuer,
        })
    }
}

// Request/response types

#[derive(Debug, Deserialize)]
struct AuthorizeParams {
    state: Option<String>,
    redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    grant_type: Option<String>,
    code: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    id_token: String,
    scope: String,
}

// Helper functions

const MAX_DESCRIPTION_LEN: usize = 200;

/// The third party's authorize URL for an envelope.
fn build_authorize_url(config: &BridgeConfig, envelope: &StateEnvelope) -> Url {
    let mut url = config.authorize_url.clone();
    {
        let mut params = url.query_pairs_mut();
        params.append_pair("client_id", &config.client_id);
        params.append_pair("redirect_uri", &config.callback_url());
        params.append_pair("scope", &config.scopes.join(","));
        params.append_pair("response_type", "code");
        params.append_pair("state", &envelope.encode());

        if envelope.is_mobile {
            for (key, value) in &config.mobile_params {
                params.append_pair(key, value);
            }
        }
    }
    url
}

/// 302 Found. axum's `Redirect` only offers 303/307/308.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// A broker `redirect_uri` we are willing to send a code to.
fn parse_redirect_target(config: &BridgeConfig, redirect_uri: &str) -> Result<Url> {
    let url = Url::parse(redirect_uri)
        .map_err(|_| Error::InvalidRequest("redirect_uri is not a valid URL".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidRequest(
            "redirect_uri must be an http(s) URL".to_string(),
        ));
    }
    if !config.is_allowed_redirect(&url) {
        tracing::warn!(
            host = url.host_str().unwrap_or(""),
            "redirect_uri origin is not allowed"
        );
        return Err(Error::InvalidRequest(
            "redirect_uri is not allowed for this client".to_string(),
        ));
    }
    Ok(url)
}

/// Origin of the current request, honoring reverse-proxy headers.
fn request_origin(headers: &HeaderMap, fallback: &Url) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let host = header_str("x-forwarded-host").or_else(|| header_str("host"));
    let Some(host) = host else {
        return fallback.as_str().trim_end_matches('/').to_string();
    };

    let scheme = header_str("x-forwarded-proto").unwrap_or_else(|| {
        if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
            "http".to_string()
        } else {
            "https".to_string()
        }
    });

    format!("{}://{}", scheme, host)
}

/// `Authorization: Bearer <token>`, nothing else.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Client credentials from HTTP Basic auth, falling back to the form body.
fn client_credentials(
    headers: &HeaderMap,
    params: &TokenRequest,
) -> (Option<String>, Option<String>) {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
        .and_then(|(_, b64)| base64::engine::general_purpose::STANDARD.decode(b64.trim()).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|pair| {
            let (id, secret) = pair.split_once(':')?;
            Some((
                urlencoding::decode(id).ok()?.into_owned(),
                urlencoding::decode(secret).ok()?.into_owned(),
            ))
        });

    match basic {
        Some((id, secret)) => (Some(id), Some(secret)),
        None => (params.client_id.clone(), params.client_secret.clone()),
    }
}

/// Short, non-reversible tag for logging codes and tokens.
fn fingerprint(secret: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

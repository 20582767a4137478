use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to OAuth clients.
///
/// Every variant maps onto an OAuth error code and renders as
/// `{"error": ..., "error_description": ...}`.
#[derive(Debug, Error)]
pub enum Error {
    // Client errors
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("invalid_client")]
    InvalidClient,
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    // Upstream failures, already stripped of upstream bodies
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("invalid_token")]
    InvalidToken,

    // Reported by the third party on the callback
    #[error("{error}: {description}")]
    Provider { error: String, description: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The OAuth `error` code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidClient => "invalid_client",
            Error::UnsupportedGrantType(_) => "unsupported_grant_type",
            Error::InvalidGrant(_) => "invalid_grant",
            Error::InvalidToken => "invalid_token",
            Error::Provider { error, .. } => error.as_str(),
            Error::Internal(_) => "server_error",
        }
    }

    pub fn description(&self) -> String {
        match self {
            Error::InvalidRequest(msg) | Error::InvalidGrant(msg) => msg.clone(),
            Error::InvalidClient => "client authentication failed".to_string(),
            Error::UnsupportedGrantType(grant) => {
                format!("grant_type '{}' is not supported", grant)
            }
            Error::InvalidToken => "the access token is invalid or expired".to_string(),
            Error::Provider { description, .. } => description.clone(),
            // never leak internals to the caller
            Error::Internal(_) => "internal server error".to_string(),
        }
    }
}

/// Failure talking to the third-party provider.
///
/// Carries the upstream status text at most, never the response body.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned {status}")]
    Status { status: String },
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream request failed: {0}")]
    Network(String),
    #[error("upstream response could not be parsed")]
    Malformed,
}

impl UpstreamError {
    /// Text safe to put in an `error_description`. Only the upstream status
    /// line is passed on; transport errors get a fixed message.
    pub fn public_description(&self) -> String {
        match self {
            UpstreamError::Status { status } => format!("upstream returned {}", status),
            UpstreamError::Timeout => "upstream request timed out".to_string(),
            UpstreamError::Network(_) => "upstream request failed".to_string(),
            UpstreamError::Malformed => "upstream response could not be parsed".to_string(),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Malformed
        } else if let Some(status) = e.status() {
            UpstreamError::Status {
                status: status.to_string(),
            }
        } else {
            // strip the URL, it may carry the access token
            UpstreamError::Network(e.without_url().to_string())
        }
    }
}

/// Invalid bridge configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid URL for {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("at least one scope must be configured")]
    NoScopes,
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::{StatusCode, header};

        let status = match self {
            Error::InvalidToken | Error::InvalidClient => StatusCode::UNAUTHORIZED,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        let body = serde_json::json!({
            "error": self.code(),
            "error_description": self.description(),
        });

        match self {
            Error::InvalidToken => (
                status,
                [(header::WWW_AUTHENTICATE, r#"Bearer error="invalid_token""#)],
                Json(body),
            )
                .into_response(),
            Error::InvalidClient => (
                status,
                [(header::WWW_AUTHENTICATE, r#"Basic realm="oauth""#)],
                Json(body),
            )
                .into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}
